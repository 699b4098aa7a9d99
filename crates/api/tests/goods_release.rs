//! Service-level checks on the goods release saga: issuing happens before
//! the request turns terminal, and a failed line rolls the others back.

use chrono::{NaiveDate, Utc};

use pitstop_api::app::services::{build_services, AppServices};
use pitstop_auth::{Department, Role};
use pitstop_bookings::TimeSlot;
use pitstop_core::PrincipalId;
use pitstop_goods::{GoodsRequestLine, GoodsRequestStatus};
use pitstop_identity::{CustomerDetails, EmployeeDetails, Profile};
use pitstop_inventory::{
    InventoryCategory, InventoryItem, ItemCommand, ItemId, ReleaseReservation, ReserveStock,
};

fn staff(services: &AppServices, email: &str, role: Role) -> PrincipalId {
    services
        .register_principal(
            email,
            "s3cret-pass",
            "Staff".into(),
            role,
            Profile::Staff(EmployeeDetails {
                department: Department::Mechanical,
                specializations: Vec::new(),
            }),
        )
        .unwrap()
}

fn approved_request(
    services: &AppServices,
    lines: Vec<(ItemId, u32)>,
) -> pitstop_goods::GoodsRequestId {
    let customer = services
        .register_principal(
            "owner@pitstop.test",
            "s3cret-pass",
            "Owner".into(),
            Role::Customer,
            Profile::Customer(CustomerDetails {
                phone: "0700".into(),
                address: None,
            }),
        )
        .unwrap();
    let vehicle = services
        .register_vehicle(
            customer,
            "KAA 100A",
            "CH-1".into(),
            "EN-1".into(),
            "Toyota".into(),
            "Hilux".into(),
            2020,
            42_000,
        )
        .unwrap();
    let booking = services
        .create_booking(
            customer,
            vehicle,
            NaiveDate::from_ymd_opt(2026, 9, 20).unwrap(),
            TimeSlot::Morning,
            "full service".into(),
        )
        .unwrap();
    let job = services.create_job(booking, "brake overhaul".into()).unwrap();

    let tech = staff(services, "tech@pitstop.test", Role::Technician);
    let manager = staff(services, "manager@pitstop.test", Role::Manager);

    let request = services
        .create_goods_request(
            job,
            tech,
            lines
                .into_iter()
                .map(|(item, quantity)| GoodsRequestLine { item, quantity })
                .collect(),
        )
        .unwrap();
    services.approve_goods_request(request, manager).unwrap();
    request
}

fn shrink_reservation(services: &AppServices, item: ItemId, quantity: u32) {
    let command = ItemCommand::ReleaseReservation(ReleaseReservation {
        item_id: item,
        quantity,
        occurred_at: Utc::now(),
    });
    services
        .dispatch::<InventoryItem>(item.0, "inventory_item", command, |id| {
            InventoryItem::empty(ItemId::new(id))
        })
        .unwrap();
}

fn reserve(services: &AppServices, item: ItemId, quantity: u32) {
    let command = ItemCommand::Reserve(ReserveStock {
        item_id: item,
        quantity,
        occurred_at: Utc::now(),
    });
    services
        .dispatch::<InventoryItem>(item.0, "inventory_item", command, |id| {
            InventoryItem::empty(ItemId::new(id))
        })
        .unwrap();
}

#[test]
fn failed_issue_leaves_request_approved_and_retryable() {
    let services = build_services(b"saga-test-secret");
    let manager = staff(&services, "boss@pitstop.test", Role::Manager);

    let item = services
        .create_item("Brake pads".into(), InventoryCategory::Parts, 900, 10, 1)
        .unwrap();
    let request = approved_request(&services, vec![(item, 4)]);

    // Someone else frees the reservation out from under the saga.
    shrink_reservation(&services, item, 4);

    services.release_goods_request(request, manager).unwrap_err();

    // The request is still approved, not terminally released, and the
    // shelf count never moved.
    assert_eq!(
        services.goods.get(&request).unwrap().status,
        GoodsRequestStatus::Approved
    );
    let row = services.inventory.get(&item).unwrap();
    assert_eq!(row.on_hand, 10);
    assert_eq!(row.reserved, 0);

    // Re-cover the quantity and the retry goes through.
    reserve(&services, item, 4);
    services.release_goods_request(request, manager).unwrap();

    assert_eq!(
        services.goods.get(&request).unwrap().status,
        GoodsRequestStatus::Released
    );
    let row = services.inventory.get(&item).unwrap();
    assert_eq!(row.on_hand, 6);
    assert_eq!(row.reserved, 0);
}

#[test]
fn failed_line_rolls_back_lines_already_issued() {
    let services = build_services(b"saga-test-secret");
    let manager = staff(&services, "boss@pitstop.test", Role::Manager);

    let pads = services
        .create_item("Brake pads".into(), InventoryCategory::Parts, 900, 10, 1)
        .unwrap();
    let fluid = services
        .create_item("Brake fluid".into(), InventoryCategory::Fluids, 400, 8, 1)
        .unwrap();
    let request = approved_request(&services, vec![(pads, 2), (fluid, 3)]);

    // The second line's reservation disappears; the first line issues,
    // then must be undone.
    shrink_reservation(&services, fluid, 3);

    services.release_goods_request(request, manager).unwrap_err();

    assert_eq!(
        services.goods.get(&request).unwrap().status,
        GoodsRequestStatus::Approved
    );
    let pads_row = services.inventory.get(&pads).unwrap();
    assert_eq!(pads_row.on_hand, 10);
    assert_eq!(pads_row.reserved, 2);
    let fluid_row = services.inventory.get(&fluid).unwrap();
    assert_eq!(fluid_row.on_hand, 8);
    assert_eq!(fluid_row.reserved, 0);
}

#[test]
fn release_of_a_pending_request_is_refused() {
    let services = build_services(b"saga-test-secret");
    let manager = staff(&services, "boss@pitstop.test", Role::Manager);

    let item = services
        .create_item("Coolant".into(), InventoryCategory::Fluids, 300, 5, 1)
        .unwrap();

    let customer = services
        .register_principal(
            "pat@pitstop.test",
            "s3cret-pass",
            "Pat".into(),
            Role::Customer,
            Profile::Customer(CustomerDetails {
                phone: "0701".into(),
                address: None,
            }),
        )
        .unwrap();
    let vehicle = services
        .register_vehicle(
            customer,
            "KAB 200B",
            "CH-2".into(),
            "EN-2".into(),
            "Mazda".into(),
            "Demio".into(),
            2018,
            60_000,
        )
        .unwrap();
    let booking = services
        .create_booking(
            customer,
            vehicle,
            NaiveDate::from_ymd_opt(2026, 9, 21).unwrap(),
            TimeSlot::Midday,
            "coolant flush".into(),
        )
        .unwrap();
    let job = services.create_job(booking, "flush".into()).unwrap();
    let tech = staff(&services, "tech2@pitstop.test", Role::Technician);

    let request = services
        .create_goods_request(job, tech, vec![GoodsRequestLine { item, quantity: 2 }])
        .unwrap();

    services.release_goods_request(request, manager).unwrap_err();
    assert_eq!(
        services.goods.get(&request).unwrap().status,
        GoodsRequestStatus::Pending
    );
    let row = services.inventory.get(&item).unwrap();
    assert_eq!(row.on_hand, 5);
    assert_eq!(row.reserved, 0);
}

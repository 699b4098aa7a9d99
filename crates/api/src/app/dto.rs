use serde::{Deserialize, Serialize};

use chrono::NaiveDate;

use pitstop_auth::{Department, Role};
use pitstop_bookings::{BookingStatus, TimeSlot};
use pitstop_identity::{PrincipalStatus, Profile};
use pitstop_infra::projections::{InventoryRow, InvoiceRow, PrincipalRow};
use pitstop_inventory::{InventoryCategory, StockDirection};
use pitstop_invoicing::{InvoiceLine, PaymentMethod};
use pitstop_jobs::{InspectionPhase, JobStatus};
use pitstop_leave::LeaveType;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    /// Defaults to `customer`. Staff roles require a department.
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub department: Option<Department>,
    pub specializations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: PrincipalStatus,
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
    pub profile: Profile,
}

#[derive(Debug, Deserialize)]
pub struct RegisterVehicleRequest {
    /// Owning customer; staff may register on a customer's behalf.
    /// Customers always register for themselves.
    pub owner: Option<String>,
    pub registration: String,
    pub chassis_number: String,
    pub engine_number: String,
    pub make: String,
    pub model: String,
    pub year: u16,
    pub mileage: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMileageRequest {
    pub mileage: u32,
}

#[derive(Debug, Deserialize)]
pub struct TransferOwnershipRequest {
    pub new_owner: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub vehicle: String,
    /// Staff may book on a customer's behalf; ignored for customers.
    pub customer: Option<String>,
    pub scheduled_date: NaiveDate,
    pub slot: TimeSlot,
    pub service_description: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignInspectorRequest {
    pub inspector: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeBookingStatusRequest {
    pub status: BookingStatus,
}

#[derive(Debug, Deserialize)]
pub struct AddNoteRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub booking: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct AssignLabourerRequest {
    pub labourer: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangeJobStatusRequest {
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct WorkLogRequest {
    pub description: String,
    pub hours: u32,
}

#[derive(Debug, Deserialize)]
pub struct InspectionRequest {
    pub phase: InspectionPhase,
    pub findings: String,
    pub approved: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub category: InventoryCategory,
    pub unit_price: u64,
    pub initial_stock: u32,
    pub minimum: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub category: Option<InventoryCategory>,
    pub unit_price: Option<u64>,
    pub minimum: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    pub direction: StockDirection,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct BulkAdjustLine {
    pub item: String,
    pub direction: StockDirection,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct BulkAdjustRequest {
    pub adjustments: Vec<BulkAdjustLine>,
}

#[derive(Debug, Deserialize)]
pub struct GoodsLineRequest {
    pub item: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateGoodsRequest {
    pub job: String,
    pub lines: Vec<GoodsLineRequest>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub booking: String,
    pub lines: Vec<InvoiceLine>,
    pub labor_charges: u64,
    pub tax: u64,
    pub discount: u64,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub lines: Option<Vec<InvoiceLine>>,
    pub labor_charges: Option<u64>,
    pub tax: Option<u64>,
    pub discount: Option<u64>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PayInvoiceRequest {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize)]
pub struct CreateLeaveRequest {
    pub leave_type: LeaveType,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub reason: String,
}

/// Common list-endpoint query parameters; route-specific filters ride along.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub role: Option<Role>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub booking: Option<String>,
    pub low_stock: Option<bool>,
}

// -------------------------
// Response mapping
// -------------------------

pub fn row_json<T: Serialize>(row: &T) -> serde_json::Value {
    serde_json::to_value(row).unwrap_or(serde_json::Value::Null)
}

/// Paginated list envelope: `{ count, total, totalPages, currentPage, items }`.
pub fn paginated<T: Serialize>(items: Vec<T>, page: Option<u64>, limit: Option<u64>) -> serde_json::Value {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(20).max(1);

    let total = items.len() as u64;
    let total_pages = total.div_ceil(limit).max(1);

    let start = ((page - 1) * limit) as usize;
    let page_items: Vec<serde_json::Value> = items
        .iter()
        .skip(start)
        .take(limit as usize)
        .map(row_json)
        .collect();

    serde_json::json!({
        "count": page_items.len(),
        "total": total,
        "totalPages": total_pages,
        "currentPage": page,
        "items": page_items,
    })
}

pub fn principal_to_json(row: &PrincipalRow) -> serde_json::Value {
    // PrincipalRow skips password/throttle fields on serialize.
    row_json(row)
}

pub fn inventory_item_to_json(row: &InventoryRow) -> serde_json::Value {
    let mut value = row_json(row);
    if let serde_json::Value::Object(map) = &mut value {
        map.insert("available".into(), row.available().into());
        map.insert("lowStock".into(), row.is_low_stock().into());
    }
    value
}

pub fn invoice_to_json(row: &InvoiceRow) -> serde_json::Value {
    let mut value = row_json(row);
    if let serde_json::Value::Object(map) = &mut value {
        map.insert("subtotal".into(), row.subtotal().into());
        map.insert("total".into(), row.total().into());
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        n: u32,
    }

    #[test]
    fn pagination_slices_and_counts() {
        let rows: Vec<Row> = (0..45).map(|n| Row { n }).collect();
        let value = paginated(rows, Some(3), Some(20));

        assert_eq!(value["count"], 5);
        assert_eq!(value["total"], 45);
        assert_eq!(value["totalPages"], 3);
        assert_eq!(value["currentPage"], 3);
        assert_eq!(value["items"].as_array().map(|a| a.len()), Some(5));
    }

    #[test]
    fn empty_list_still_reports_one_page() {
        let value = paginated(Vec::<Row>::new(), None, None);
        assert_eq!(value["total"], 0);
        assert_eq!(value["totalPages"], 1);
        assert_eq!(value["currentPage"], 1);
    }
}

//! Invoices raised against completed bookings.

pub mod invoice;

pub use invoice::{
    CancelInvoice, CreateInvoice, Invoice, InvoiceCommand, InvoiceCreated, InvoiceEvent, InvoiceId,
    InvoiceLine, InvoiceStatus, InvoiceTotals, IssueInvoice, MarkInvoicePaid, PaymentMethod,
    UpdateInvoice,
};

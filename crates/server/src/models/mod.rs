//! Domain types returned by repositories and serialized by handlers.
//!
//! These are validated domain objects, separate from database row types.

pub mod analytics;
pub mod api_key;
pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod inventory;
pub mod notification;
pub mod order;
pub mod review;
pub mod session;
pub mod shipping;
pub mod support;
pub mod user;

pub use analytics::{AnalyticsSummary, DailyRevenue, RevenueTotals, StatusCount, TopProduct};
pub use api_key::{ApiKey, CreatedApiKey};
pub use cart::{Cart, CartItem};
pub use catalog::{Category, Product, ProductDetail, Variant};
pub use coupon::{Coupon, CouponRejection};
pub use inventory::{
    InventoryLevel, LowStockProduct, StockMovement, StockTransfer, TransferItem, Warehouse,
};
pub use notification::{Notification, NotificationList};
pub use order::{AddressSnapshot, Invoice, InvoiceLine, Order, OrderItem, OrderWithItems};
pub use review::{Review, ReviewSummary};
pub use session::{CurrentUser, session_keys};
pub use shipping::{ShippingQuote, ShippingZone};
pub use support::{ChatMessage, Conversation, MessagesPage, Ticket, TicketMessage, TicketThread};
pub use user::{Address, User};

pub mod cart;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod payment_transaction;
pub mod product;
pub mod refund;
pub mod return_item;
pub mod return_request;

pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use order::{
    Entity as Order, Model as OrderModel, OrderStatus, PaymentMethod, PaymentStatus,
};
pub use order_item::{Entity as OrderItem, Model as OrderItemModel};
pub use payment_transaction::{
    Entity as PaymentTransaction, Model as PaymentTransactionModel, TransactionKind,
    TransactionStatus,
};
pub use product::{Entity as Product, Model as ProductModel};
pub use refund::{Entity as Refund, Model as RefundModel, RefundInitiator, RefundStatus};
pub use return_item::{Entity as ReturnItem, Model as ReturnItemModel};
pub use return_request::{Entity as ReturnRequest, Model as ReturnModel, ReturnStatus};

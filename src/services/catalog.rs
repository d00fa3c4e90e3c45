//! Stock contract over the product catalog.
//!
//! Every function takes a `ConnectionTrait` so it runs inside whatever unit
//! of work the caller holds. Stock is only ever changed with single
//! conditional `UPDATE` statements, never load-modify-save.

use crate::entities::product::{self, Entity as Product, Model as ProductModel};
use crate::errors::ServiceError;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use tracing::debug;
use uuid::Uuid;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Loads a product or fails with `NotFound`.
pub async fn find_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<ProductModel, ServiceError> {
    Product::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
}

/// `stock -= qty, sales += qty` when at least `qty` units remain.
///
/// Returns `false` when the guard matched no row, i.e. stock was insufficient
/// (or the product vanished).
pub async fn try_decrement_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    qty: i32,
) -> Result<bool, ServiceError> {
    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).sub(qty),
        )
        .col_expr(
            product::Column::Sales,
            Expr::col(product::Column::Sales).add(qty),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::Stock.gte(qty))
        .exec(conn)
        .await?;

    debug!(%product_id, qty, matched = result.rows_affected, "conditional stock decrement");
    Ok(result.rows_affected == 1)
}

/// Exact inverse of [`try_decrement_stock`]: `stock += qty, sales -= qty`.
pub async fn increment_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    qty: i32,
) -> Result<(), ServiceError> {
    let result = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(qty),
        )
        .col_expr(
            product::Column::Sales,
            Expr::col(product::Column::Sales).sub(qty),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::NotFound(format!(
            "Product {} not found",
            product_id
        )));
    }
    Ok(())
}

/// `price × (1 − discount/100)`.
pub fn effective_unit_price(product: &ProductModel) -> Decimal {
    product.price * (HUNDRED - product.discount) / HUNDRED
}

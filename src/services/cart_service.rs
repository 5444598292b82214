use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{AddToCartRequest, UpdateCartItemRequest},
    entity::{
        cart_items::{
            ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems,
            Model as CartItemModel,
        },
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartLine, ProductSummary, cart_total, line_total},
    response::{ApiResponse, Meta},
    services::product_service,
    state::AppState,
};

/// A cart row together with its lines in display order.
pub(crate) struct CartSnapshot {
    pub cart: CartModel,
    pub lines: Vec<CartItemModel>,
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    if payload.quantity <= 0 {
        return Err(AppError::bad_request("quantity must be greater than 0"));
    }

    let _guard = state.cart_locks.acquire(user.user_id).await;
    let txn = state.orm.begin().await?;

    let product = product_service::find_active_product(&txn, payload.product_id).await?;
    let now = Utc::now();

    let cart = match find_cart(&txn, user.user_id).await? {
        Some(cart) => cart,
        None => {
            tracing::debug!(user_id = %user.user_id, "creating cart");
            CartActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                total_price: Set(0),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await?
        }
    };

    let existing = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product.id))
        .one(&txn)
        .await?;

    match existing {
        Some(line) => {
            // Re-adds keep the price captured on the first add.
            let quantity = line
                .quantity
                .checked_add(payload.quantity)
                .ok_or_else(too_large)?;
            let total_item_price = priced(quantity, line.product_price)?;
            let mut active: CartItemActive = line.into();
            active.quantity = Set(quantity);
            active.total_item_price = Set(total_item_price);
            active.update(&txn).await?;
        }
        None => {
            let total_item_price = priced(payload.quantity, product.price)?;
            CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                product_name: Set(product.name.clone()),
                product_price: Set(product.price),
                quantity: Set(payload.quantity),
                total_item_price: Set(total_item_price),
                created_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;
        }
    }

    let snapshot = refresh_total(&txn, cart, now).await?;
    txn.commit().await?;

    tracing::info!(
        user_id = %user.user_id,
        product_id = %payload.product_id,
        quantity = payload.quantity,
        total_price = snapshot.cart.total_price,
        "item added to cart"
    );
    audit::record(
        state,
        Some(user.user_id),
        "cart_add",
        "carts",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    let cart = resolve_cart(state, snapshot).await?;
    Ok(ApiResponse::success("Item added to cart", cart, Some(Meta::empty())))
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let snapshot = load_cart(&state.orm, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;

    let cart = resolve_cart(state, snapshot).await?;
    Ok(ApiResponse::success("Cart retrieved", cart, Some(Meta::empty())))
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<Cart>> {
    if payload.quantity < 0 {
        return Err(AppError::bad_request("quantity must not be negative"));
    }

    let _guard = state.cart_locks.acquire(user.user_id).await;
    let txn = state.orm.begin().await?;

    let cart = find_cart(&txn, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;

    let line = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product_id))
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("Product in cart"))?;

    if payload.quantity == 0 {
        CartItems::delete_by_id(line.id).exec(&txn).await?;
    } else {
        let total_item_price = priced(payload.quantity, line.product_price)?;
        let mut active: CartItemActive = line.into();
        active.quantity = Set(payload.quantity);
        active.total_item_price = Set(total_item_price);
        active.update(&txn).await?;
    }

    let snapshot = refresh_total(&txn, cart, Utc::now()).await?;
    txn.commit().await?;

    audit::record(
        state,
        Some(user.user_id),
        "cart_update",
        "carts",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
    )
    .await;

    let cart = resolve_cart(state, snapshot).await?;
    Ok(ApiResponse::success("Cart updated", cart, Some(Meta::empty())))
}

pub async fn remove_cart_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<Cart>> {
    let _guard = state.cart_locks.acquire(user.user_id).await;
    let txn = state.orm.begin().await?;

    let cart = find_cart(&txn, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;

    let result = CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product_id))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(AppError::not_found("Product in cart"));
    }

    let snapshot = refresh_total(&txn, cart, Utc::now()).await?;
    txn.commit().await?;

    audit::record(
        state,
        Some(user.user_id),
        "cart_remove",
        "carts",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    let cart = resolve_cart(state, snapshot).await?;
    Ok(ApiResponse::success("Removed from cart", cart, Some(Meta::empty())))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let _guard = state.cart_locks.acquire(user.user_id).await;
    let txn = state.orm.begin().await?;

    let cart = find_cart(&txn, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;
    let snapshot = empty_cart(&txn, cart, Utc::now()).await?;
    txn.commit().await?;

    audit::record(
        state,
        Some(user.user_id),
        "cart_clear",
        "carts",
        serde_json::json!({ "cart_id": snapshot.cart.id }),
    )
    .await;

    let cart = resolve_cart(state, snapshot).await?;
    Ok(ApiResponse::success("Cart cleared", cart, Some(Meta::empty())))
}

pub(crate) async fn find_cart<C>(conn: &C, user_id: Uuid) -> AppResult<Option<CartModel>>
where
    C: ConnectionTrait,
{
    Ok(Carts::find()
        .filter(CartCol::UserId.eq(user_id))
        .one(conn)
        .await?)
}

pub(crate) async fn load_cart<C>(conn: &C, user_id: Uuid) -> AppResult<Option<CartSnapshot>>
where
    C: ConnectionTrait,
{
    let Some(cart) = find_cart(conn, user_id).await? else {
        return Ok(None);
    };
    let lines = load_lines(conn, cart.id).await?;
    Ok(Some(CartSnapshot { cart, lines }))
}

/// Drops every line and zeroes the total; the cart row itself stays.
pub(crate) async fn empty_cart<C>(
    conn: &C,
    cart: CartModel,
    now: DateTime<Utc>,
) -> AppResult<CartSnapshot>
where
    C: ConnectionTrait,
{
    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(conn)
        .await?;
    refresh_total(conn, cart, now).await
}

async fn load_lines<C>(conn: &C, cart_id: Uuid) -> AppResult<Vec<CartItemModel>>
where
    C: ConnectionTrait,
{
    Ok(CartItems::find()
        .filter(CartItemCol::CartId.eq(cart_id))
        .order_by_asc(CartItemCol::CreatedAt)
        .order_by_asc(CartItemCol::Id)
        .all(conn)
        .await?)
}

/// Re-reads the lines and stores their sum as the cart total.
async fn refresh_total<C>(conn: &C, cart: CartModel, now: DateTime<Utc>) -> AppResult<CartSnapshot>
where
    C: ConnectionTrait,
{
    let lines = load_lines(conn, cart.id).await?;
    let total = cart_total(lines.iter().map(|line| line.total_item_price)).ok_or_else(too_large)?;

    let mut active: CartActive = cart.into();
    active.total_price = Set(total);
    active.updated_at = Set(now.into());
    let cart = active.update(conn).await?;

    Ok(CartSnapshot { cart, lines })
}

fn priced(quantity: i32, unit_price: i64) -> AppResult<i64> {
    line_total(quantity, unit_price).ok_or_else(too_large)
}

fn too_large() -> AppError {
    AppError::bad_request("quantity is too large")
}

async fn resolve_cart(state: &AppState, snapshot: CartSnapshot) -> AppResult<Cart> {
    let ids: Vec<Uuid> = snapshot.lines.iter().map(|line| line.product_id).collect();
    let summaries = product_service::summaries_by_ids(&state.orm, &ids).await?;
    Ok(cart_from_entity(snapshot, &summaries))
}

fn cart_from_entity(snapshot: CartSnapshot, summaries: &HashMap<Uuid, ProductSummary>) -> Cart {
    let CartSnapshot { cart, lines } = snapshot;
    Cart {
        id: cart.id,
        user_id: cart.user_id,
        items: lines
            .into_iter()
            .map(|line| CartLine {
                product: summaries.get(&line.product_id).cloned(),
                product_id: line.product_id,
                quantity: line.quantity,
                product_name: line.product_name,
                product_price: line.product_price,
                total_item_price: line.total_item_price,
            })
            .collect(),
        total_price: cart.total_price,
        created_at: cart.created_at.with_timezone(&Utc),
        updated_at: cart.updated_at.with_timezone(&Utc),
    }
}

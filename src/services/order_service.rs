use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{
        CreateOrderRequest, DeleteOrderResult, OrderList, OrderStatusView, OrderWithItems,
        UpdateOrderStatusRequest,
    },
    entity::{
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{
            ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, OrderStatus, ProductSummary},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{cart_service, product_service},
    state::AppState,
};

/// Converts the caller's cart into a `Pending` order and empties the cart.
///
/// Items copy the cart lines' stored name and unit price, so later catalog
/// edits never reach the order. The order total is the cart total as it stood.
pub async fn create_order_from_cart(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let shipping_address = payload.shipping_address.trim().to_string();
    if shipping_address.is_empty() {
        return Err(AppError::bad_request("shipping_address is required"));
    }

    let _guard = state.cart_locks.acquire(user.user_id).await;
    let txn = state.orm.begin().await?;

    let snapshot = cart_service::load_cart(&txn, user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Cart"))?;
    if snapshot.lines.is_empty() {
        return Err(AppError::bad_request("Cart is empty"));
    }

    let now = Utc::now();
    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        total_amount: Set(snapshot.cart.total_price),
        status: Set(OrderStatus::Pending),
        shipping_address: Set(shipping_address),
        delivery_date: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(snapshot.lines.len());
    for (position, line) in snapshot.lines.iter().enumerate() {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            product_name: Set(line.product_name.clone()),
            quantity: Set(line.quantity),
            price: Set(line.product_price),
            position: Set(position as i32),
        }
        .insert(&txn)
        .await?;
        items.push(item);
    }

    cart_service::empty_cart(&txn, snapshot.cart, now).await?;
    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        user_id = %user.user_id,
        total_amount = order.total_amount,
        items = items.len(),
        "order created from cart"
    );
    audit::record(
        state,
        Some(user.user_id),
        "order_create",
        "orders",
        serde_json::json!({ "order_id": order.id, "total_amount": order.total_amount }),
    )
    .await;

    let summaries = summaries_for(state, &items).await?;
    let order = with_items(order, items, &summaries);
    Ok(ApiResponse::success("Order created", order, Some(Meta::empty())))
}

pub async fn get_order_by_id(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = find_owned(state, user.user_id, order_id).await?;
    let items = load_items(&state.orm, &[order.id]).await?;
    let summaries = summaries_for(state, &items).await?;

    Ok(ApiResponse::success(
        "Order retrieved",
        with_items(order, items, &summaries),
        None,
    ))
}

pub async fn get_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<OrderStatus>())
        .transpose()
        .map_err(|err| AppError::bad_request(err.to_string()))?;

    let mut finder = Orders::find().filter(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = status {
        finder = finder.filter(OrderCol::Status.eq(status));
    }
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };
    let orders = finder.order_by_asc(OrderCol::Id).all(&state.orm).await?;

    let ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
    let items = load_items(&state.orm, &ids).await?;
    let summaries = summaries_for(state, &items).await?;

    let mut by_order: HashMap<Uuid, Vec<OrderItemModel>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }

    let items = orders
        .into_iter()
        .map(|order| {
            let lines = by_order.remove(&order.id).unwrap_or_default();
            with_items(order, lines, &summaries)
        })
        .collect();

    Ok(ApiResponse::success(
        "Orders retrieved",
        OrderList { items },
        None,
    ))
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let next: OrderStatus = payload.status.parse().map_err(|_| {
        AppError::bad_request(format!(
            "Invalid status. Expected one of: {}",
            OrderStatus::ALL.map(|s| s.as_str()).join(", ")
        ))
    })?;

    let existing = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;

    let current = existing.status;
    if !current.can_transition_to(next) {
        return Err(illegal_transition(current, next));
    }

    let now = Utc::now();
    let mut changes = OrderActive {
        status: Set(next),
        updated_at: Set(now.into()),
        ..Default::default()
    };
    if next == OrderStatus::Delivered {
        changes.delivery_date = Set(Some(now.into()));
    }

    // Only applies while the row still holds the status checked above.
    let result = Orders::update_many()
        .set(changes)
        .filter(OrderCol::Id.eq(order_id))
        .filter(OrderCol::Status.eq(current))
        .exec(&state.orm)
        .await?;

    let order = Orders::find_by_id(order_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    if result.rows_affected == 0 {
        tracing::debug!(order_id = %order_id, to = %next, "status changed concurrently");
        return Err(illegal_transition(order.status, next));
    }

    tracing::info!(order_id = %order.id, from = %current, to = %next, "order status changed");
    audit::record(
        state,
        Some(user.user_id),
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": current, "to": next }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated",
        order_from_entity(order),
        Some(Meta::empty()),
    ))
}

pub async fn get_order_status(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<OrderStatusView>> {
    let order = find_owned(state, user.user_id, order_id).await?;
    Ok(ApiResponse::success(
        "Order status retrieved",
        OrderStatusView {
            status: order.status,
        },
        None,
    ))
}

/// Owner-scoped delete. A missing or foreign order reports `deleted: false`.
pub async fn delete_order(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
) -> AppResult<ApiResponse<DeleteOrderResult>> {
    let result = Orders::delete_many()
        .filter(OrderCol::Id.eq(order_id))
        .filter(OrderCol::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;
    let deleted = result.rows_affected > 0;

    if deleted {
        tracing::info!(order_id = %order_id, user_id = %user.user_id, "order deleted");
        audit::record(
            state,
            Some(user.user_id),
            "order_delete",
            "orders",
            serde_json::json!({ "order_id": order_id }),
        )
        .await;
    }

    let message = if deleted {
        "Order deleted"
    } else {
        "Order not found"
    };
    Ok(ApiResponse::success(
        message,
        DeleteOrderResult { deleted },
        Some(Meta::empty()),
    ))
}

fn illegal_transition(from: OrderStatus, to: OrderStatus) -> AppError {
    AppError::bad_request(format!("Cannot change order status from {from} to {to}"))
}

async fn find_owned(state: &AppState, user_id: Uuid, order_id: Uuid) -> AppResult<OrderModel> {
    Orders::find_by_id(order_id)
        .filter(OrderCol::UserId.eq(user_id))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))
}

async fn load_items<C>(conn: &C, order_ids: &[Uuid]) -> AppResult<Vec<OrderItemModel>>
where
    C: ConnectionTrait,
{
    if order_ids.is_empty() {
        return Ok(Vec::new());
    }
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.is_in(order_ids.iter().copied()))
        .order_by_asc(OrderItemCol::OrderId)
        .order_by_asc(OrderItemCol::Position)
        .all(conn)
        .await?)
}

async fn summaries_for(
    state: &AppState,
    items: &[OrderItemModel],
) -> AppResult<HashMap<Uuid, ProductSummary>> {
    let ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();
    product_service::summaries_by_ids(&state.orm, &ids).await
}

fn with_items(
    order: OrderModel,
    items: Vec<OrderItemModel>,
    summaries: &HashMap<Uuid, ProductSummary>,
) -> OrderWithItems {
    OrderWithItems {
        order: order_from_entity(order),
        items: items
            .into_iter()
            .map(|item| order_item_from_entity(item, summaries))
            .collect(),
    }
}

fn order_from_entity(model: OrderModel) -> Order {
    Order {
        id: model.id,
        user_id: model.user_id,
        total_amount: model.total_amount,
        status: model.status,
        shipping_address: model.shipping_address,
        delivery_date: model.delivery_date.map(|d| d.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(
    model: OrderItemModel,
    summaries: &HashMap<Uuid, ProductSummary>,
) -> OrderItem {
    OrderItem {
        product: summaries.get(&model.product_id).cloned(),
        product_id: model.product_id,
        product_name: model.product_name,
        quantity: model.quantity,
        price: model.price,
    }
}

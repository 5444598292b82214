mod common;

use storefront_api::{
    dto::{
        cart::AddToCartRequest,
        orders::{CreateOrderRequest, UpdateOrderStatusRequest},
        products::UpdateProductRequest,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::OrderStatus,
    routes::params::{OrderListQuery, SortOrder},
    services::{cart_service, order_service, product_service},
    state::AppState,
};
use uuid::Uuid;

use common::{admin, create_product, customer, setup_state};

fn address() -> CreateOrderRequest {
    CreateOrderRequest {
        shipping_address: "221B Baker Street".into(),
    }
}

fn status(value: &str) -> UpdateOrderStatusRequest {
    UpdateOrderStatusRequest {
        status: value.into(),
    }
}

async fn add(state: &AppState, user: &AuthUser, product_id: Uuid, quantity: i32) -> anyhow::Result<()> {
    cart_service::add_to_cart(
        state,
        user,
        AddToCartRequest {
            product_id,
            quantity,
        },
    )
    .await?;
    Ok(())
}

/// Places a one-line order and returns its id.
async fn place_order(state: &AppState, user: &AuthUser, price: i64) -> anyhow::Result<Uuid> {
    let product = create_product(state, "Widget", price).await?;
    add(state, user, product.id, 1).await?;
    let order = order_service::create_order_from_cart(state, user, address())
        .await?
        .data
        .unwrap();
    Ok(order.order.id)
}

#[tokio::test]
async fn checkout_scenario_copies_the_cart() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "buyer@example.com").await?;
    let p1 = create_product(&state, "P1", 999).await?;

    add(&state, &user, p1.id, 2).await?;
    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert_eq!(cart.items[0].quantity, 2);
    assert_eq!(cart.items[0].product_price, 999);
    assert_eq!(cart.items[0].total_item_price, 1998);
    assert_eq!(cart.total_price, 1998);

    let created = order_service::create_order_from_cart(&state, &user, address())
        .await?
        .data
        .unwrap();
    assert_eq!(created.order.total_amount, 1998);
    assert_eq!(created.order.status, OrderStatus::Pending);
    assert_eq!(created.order.user_id, user.user_id);
    assert_eq!(created.order.shipping_address, "221B Baker Street");
    assert!(created.order.delivery_date.is_none());
    assert_eq!(created.items.len(), 1);
    assert_eq!(created.items[0].quantity, 2);
    assert_eq!(created.items[0].price, 999);
    assert_eq!(created.items[0].product_name, "P1");

    let fetched = order_service::get_order_by_id(&state, &user, created.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.order.total_amount, 1998);
    assert_eq!(fetched.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn multi_line_conversion_keeps_every_line() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "many@example.com").await?;
    let a = create_product(&state, "A", 120).await?;
    let b = create_product(&state, "B", 4500).await?;
    let c = create_product(&state, "C", 1).await?;

    add(&state, &user, a.id, 3).await?;
    add(&state, &user, b.id, 1).await?;
    add(&state, &user, c.id, 7).await?;
    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();

    let order = order_service::create_order_from_cart(&state, &user, address())
        .await?
        .data
        .unwrap();
    assert_eq!(order.order.total_amount, cart.total_price);
    assert_eq!(order.items.len(), cart.items.len());
    for (item, line) in order.items.iter().zip(&cart.items) {
        assert_eq!(item.product_id, line.product_id);
        assert_eq!(item.quantity, line.quantity);
        assert_eq!(item.price, line.product_price);
    }
    Ok(())
}

#[tokio::test]
async fn checkout_clears_the_cart_and_rejects_a_second_run() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "twice@example.com").await?;

    let err = order_service::create_order_from_cart(&state, &user, address())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "no cart yet");

    place_order(&state, &user, 500).await?;

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_price, 0);

    let err = order_service::create_order_from_cart(&state, &user, address())
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(message) => assert_eq!(message, "Cart is empty"),
        other => panic!("unexpected error: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn blank_address_is_rejected_before_touching_the_cart() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "blank@example.com").await?;
    let product = create_product(&state, "Widget", 100).await?;
    add(&state, &user, product.id, 1).await?;

    let err = order_service::create_order_from_cart(
        &state,
        &user,
        CreateOrderRequest {
            shipping_address: "   ".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    Ok(())
}

#[tokio::test]
async fn orders_are_scoped_to_their_owner() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let owner = customer(&state, "owner@example.com").await?;
    let stranger = customer(&state, "stranger@example.com").await?;
    let order_id = place_order(&state, &owner, 300).await?;

    let err = order_service::get_order_by_id(&state, &stranger, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = order_service::get_order_status(&state, &stranger, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let listed = order_service::get_all_orders(&state, &stranger, OrderListQuery::default())
        .await?
        .data
        .unwrap();
    assert!(listed.items.is_empty());

    let deleted = order_service::delete_order(&state, &stranger, order_id)
        .await?
        .data
        .unwrap();
    assert!(!deleted.deleted);

    let current = order_service::get_order_status(&state, &owner, order_id)
        .await?
        .data
        .unwrap();
    assert_eq!(current.status, OrderStatus::Pending);
    Ok(())
}

#[tokio::test]
async fn delete_is_idempotent() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "delete@example.com").await?;
    let order_id = place_order(&state, &user, 300).await?;

    let first = order_service::delete_order(&state, &user, order_id).await?;
    assert!(first.data.unwrap().deleted);

    let second = order_service::delete_order(&state, &user, order_id).await?;
    assert!(!second.data.unwrap().deleted);

    let err = order_service::get_order_by_id(&state, &user, order_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn status_updates_follow_the_lifecycle() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "life@example.com").await?;
    let boss = admin(&state, "boss@example.com").await?;
    let order_id = place_order(&state, &user, 300).await?;

    let err = order_service::update_order_status(&state, &user, order_id, status("Shipped"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    for bad in ["shipped", "Paid", "", " Shipped"] {
        let err = order_service::update_order_status(&state, &boss, order_id, status(bad))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)), "{bad:?}");
    }

    let err = order_service::update_order_status(&state, &boss, Uuid::new_v4(), status("Shipped"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = order_service::update_order_status(&state, &boss, order_id, status("Delivered"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "Pending -> Delivered");

    let shipped = order_service::update_order_status(&state, &boss, order_id, status("Shipped"))
        .await?
        .data
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    assert!(shipped.delivery_date.is_none());

    let delivered = order_service::update_order_status(&state, &boss, order_id, status("Delivered"))
        .await?
        .data
        .unwrap();
    assert_eq!(delivered.status, OrderStatus::Delivered);
    assert!(delivered.delivery_date.is_some());

    let err = order_service::update_order_status(&state, &boss, order_id, status("Pending"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)), "Delivered -> Pending");

    let current = order_service::get_order_status(&state, &user, order_id)
        .await?
        .data
        .unwrap();
    assert_eq!(current.status, OrderStatus::Delivered);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_status_updates_apply_exactly_one() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "contested@example.com").await?;
    let boss = admin(&state, "dispatch@example.com").await?;

    for _ in 0..20 {
        let order_id = place_order(&state, &user, 500).await?;
        order_service::update_order_status(&state, &boss, order_id, status("Shipped")).await?;

        let handles: Vec<_> = ["Delivered", "Cancelled"]
            .into_iter()
            .map(|next| {
                let state = state.clone();
                let boss = boss.clone();
                tokio::spawn(async move {
                    order_service::update_order_status(&state, &boss, order_id, status(next)).await
                })
            })
            .collect();

        let mut applied = Vec::new();
        for handle in handles {
            match handle.await? {
                Ok(resp) => applied.push(resp.data.unwrap().status),
                Err(err) => assert!(matches!(err, AppError::BadRequest(_)), "{err:?}"),
            }
        }
        assert_eq!(applied.len(), 1, "exactly one transition wins");

        let stored = order_service::get_order_by_id(&state, &user, order_id)
            .await?
            .data
            .unwrap()
            .order;
        assert_eq!(stored.status, applied[0]);
        assert_eq!(
            stored.delivery_date.is_some(),
            stored.status == OrderStatus::Delivered
        );
    }
    Ok(())
}

#[tokio::test]
async fn list_filters_by_status_and_sorts_by_creation() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "list@example.com").await?;
    let boss = admin(&state, "boss@example.com").await?;

    let first = place_order(&state, &user, 100).await?;
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    let second = place_order(&state, &user, 200).await?;
    order_service::update_order_status(&state, &boss, first, status("Cancelled")).await?;

    let newest_first = order_service::get_all_orders(&state, &user, OrderListQuery::default())
        .await?
        .data
        .unwrap();
    let ids: Vec<Uuid> = newest_first.items.iter().map(|o| o.order.id).collect();
    assert_eq!(ids, vec![second, first]);
    assert!(newest_first.items.iter().all(|o| o.items.len() == 1));

    let oldest_first = order_service::get_all_orders(
        &state,
        &user,
        OrderListQuery {
            status: None,
            sort_order: Some(SortOrder::Asc),
        },
    )
    .await?
    .data
    .unwrap();
    let ids: Vec<Uuid> = oldest_first.items.iter().map(|o| o.order.id).collect();
    assert_eq!(ids, vec![first, second]);

    let cancelled = order_service::get_all_orders(
        &state,
        &user,
        OrderListQuery {
            status: Some("Cancelled".into()),
            sort_order: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled.items.len(), 1);
    assert_eq!(cancelled.items[0].order.id, first);

    let err = order_service::get_all_orders(
        &state,
        &user,
        OrderListQuery {
            status: Some("cancelled".into()),
            sort_order: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}

#[tokio::test]
async fn catalog_edits_do_not_alter_placed_orders() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "snapshot@example.com").await?;
    let boss = admin(&state, "boss@example.com").await?;
    let product = create_product(&state, "Lamp", 2000).await?;

    add(&state, &user, product.id, 1).await?;
    let order = order_service::create_order_from_cart(&state, &user, address())
        .await?
        .data
        .unwrap();

    product_service::update_product(
        &state,
        &boss,
        product.id,
        UpdateProductRequest {
            name: Some("Desk Lamp".into()),
            price: Some(9000),
            ..Default::default()
        },
    )
    .await?;

    let fetched = order_service::get_order_by_id(&state, &user, order.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.order.total_amount, 2000);
    assert_eq!(fetched.items[0].price, 2000);
    assert_eq!(fetched.items[0].product_name, "Lamp");
    assert_eq!(fetched.items[0].product.as_ref().map(|p| p.price), Some(9000));
    Ok(())
}

mod common;

use storefront_api::{
    dto::{
        cart::{AddToCartRequest, UpdateCartItemRequest},
        products::UpdateProductRequest,
    },
    error::AppError,
    models::Cart,
    services::{cart_service, product_service},
};

use common::{admin, create_product, customer, setup_state};

fn add(product_id: uuid::Uuid, quantity: i32) -> AddToCartRequest {
    AddToCartRequest {
        product_id,
        quantity,
    }
}

fn assert_total_is_sum(cart: &Cart) {
    let sum: i64 = cart.items.iter().map(|line| line.total_item_price).sum();
    assert_eq!(cart.total_price, sum);
}

#[tokio::test]
async fn re_adding_a_product_merges_into_one_line() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "merge@example.com").await?;
    let widget = create_product(&state, "Widget", 250).await?;
    let gadget = create_product(&state, "Gadget", 1000).await?;

    cart_service::add_to_cart(&state, &user, add(widget.id, 2)).await?;
    cart_service::add_to_cart(&state, &user, add(gadget.id, 1)).await?;
    let cart = cart_service::add_to_cart(&state, &user, add(widget.id, 3))
        .await?
        .data
        .unwrap();

    assert_eq!(cart.items.len(), 2);
    let line = cart
        .items
        .iter()
        .find(|line| line.product_id == widget.id)
        .unwrap();
    assert_eq!(line.quantity, 5);
    assert_eq!(line.product_price, 250);
    assert_eq!(line.total_item_price, 1250);
    assert_eq!(cart.total_price, 2250);
    assert_total_is_sum(&cart);

    // Lines keep insertion order.
    assert_eq!(cart.items[0].product_id, widget.id);
    assert_eq!(cart.items[1].product_id, gadget.id);
    Ok(())
}

#[tokio::test]
async fn add_validates_quantity_and_product() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "validate@example.com").await?;
    let boss = admin(&state, "boss@example.com").await?;
    let widget = create_product(&state, "Widget", 250).await?;

    let err = cart_service::add_to_cart(&state, &user, add(widget.id, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = cart_service::add_to_cart(&state, &user, add(uuid::Uuid::new_v4(), 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    product_service::update_product(
        &state,
        &boss,
        widget.id,
        UpdateProductRequest {
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await?;
    let err = cart_service::add_to_cart(&state, &user, add(widget.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    // Nothing was written, so there is still no cart.
    let err = cart_service::get_cart(&state, &user).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    Ok(())
}

#[tokio::test]
async fn price_changes_do_not_reach_existing_lines() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "price@example.com").await?;
    let boss = admin(&state, "boss@example.com").await?;
    let widget = create_product(&state, "Widget", 999).await?;

    cart_service::add_to_cart(&state, &user, add(widget.id, 1)).await?;
    product_service::update_product(
        &state,
        &boss,
        widget.id,
        UpdateProductRequest {
            price: Some(1500),
            ..Default::default()
        },
    )
    .await?;

    let cart = cart_service::add_to_cart(&state, &user, add(widget.id, 1))
        .await?
        .data
        .unwrap();
    let line = &cart.items[0];
    assert_eq!(line.product_price, 999);
    assert_eq!(line.total_item_price, 1998);
    assert_eq!(cart.total_price, 1998);

    // The live product is shown next to the snapshot.
    assert_eq!(line.product.as_ref().map(|p| p.price), Some(1500));
    Ok(())
}

#[tokio::test]
async fn deleted_product_leaves_line_without_live_summary() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "gone@example.com").await?;
    let boss = admin(&state, "boss@example.com").await?;
    let widget = create_product(&state, "Widget", 400).await?;

    cart_service::add_to_cart(&state, &user, add(widget.id, 2)).await?;
    product_service::delete_product(&state, &boss, widget.id).await?;

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].product_name, "Widget");
    assert!(cart.items[0].product.is_none());
    assert_eq!(cart.total_price, 800);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_never_lose_an_increment() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "race@example.com").await?;
    let widget = create_product(&state, "Widget", 100).await?;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let state = state.clone();
        let user = user.clone();
        let product_id = widget.id;
        handles.push(tokio::spawn(async move {
            cart_service::add_to_cart(&state, &user, add(product_id, 1)).await
        }));
    }
    for handle in handles {
        handle.await??;
    }

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.items[0].quantity, 10);
    assert_eq!(cart.total_price, 1000);
    Ok(())
}

#[tokio::test]
async fn update_remove_and_clear() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "edit@example.com").await?;
    let widget = create_product(&state, "Widget", 300).await?;
    let gadget = create_product(&state, "Gadget", 700).await?;

    let err = cart_service::update_cart_item(
        &state,
        &user,
        widget.id,
        UpdateCartItemRequest { quantity: 1 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)), "no cart yet");

    cart_service::add_to_cart(&state, &user, add(widget.id, 1)).await?;
    cart_service::add_to_cart(&state, &user, add(gadget.id, 1)).await?;

    let cart = cart_service::update_cart_item(
        &state,
        &user,
        widget.id,
        UpdateCartItemRequest { quantity: 4 },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.total_price, 4 * 300 + 700);
    assert_total_is_sum(&cart);

    let err = cart_service::update_cart_item(
        &state,
        &user,
        widget.id,
        UpdateCartItemRequest { quantity: -1 },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let cart = cart_service::update_cart_item(
        &state,
        &user,
        widget.id,
        UpdateCartItemRequest { quantity: 0 },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total_price, 700);

    let err = cart_service::remove_cart_item(&state, &user, widget.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let cart = cart_service::remove_cart_item(&state, &user, gadget.id)
        .await?
        .data
        .unwrap();
    assert!(cart.items.is_empty());
    assert_eq!(cart.total_price, 0);

    cart_service::add_to_cart(&state, &user, add(gadget.id, 2)).await?;
    let cleared = cart_service::clear_cart(&state, &user).await?.data.unwrap();
    assert!(cleared.items.is_empty());
    assert_eq!(cleared.total_price, 0);
    assert_eq!(cleared.id, cart.id, "cart record is retained");
    Ok(())
}

#[tokio::test]
async fn totals_that_overflow_are_rejected_without_writing() -> anyhow::Result<()> {
    let state = setup_state().await?;
    let user = customer(&state, "overflow@example.com").await?;
    let huge = create_product(&state, "Huge", i64::MAX / 2).await?;

    let err = cart_service::add_to_cart(&state, &user, add(huge.id, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    // The cart created by the failed add was rolled back with it.
    let err = cart_service::get_cart(&state, &user).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let first = create_product(&state, "First", i64::MAX / 2 + 1).await?;
    let second = create_product(&state, "Second", i64::MAX / 2 + 1).await?;
    let cart = cart_service::add_to_cart(&state, &user, add(first.id, 1))
        .await?
        .data
        .unwrap();
    assert_eq!(cart.total_price, i64::MAX / 2 + 1);

    let err = cart_service::add_to_cart(&state, &user, add(second.id, 1))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let cart = cart_service::get_cart(&state, &user).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.total_price, i64::MAX / 2 + 1);
    assert_total_is_sum(&cart);
    Ok(())
}

use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, RegisterRequest, UpdateProfileRequest},
        cart::{AddToCartRequest, UpdateCartItemRequest},
        orders::{
            CreateOrderRequest, DeleteOrderResult, OrderList, OrderStatusView, OrderWithItems,
            UpdateOrderStatusRequest,
        },
        payment::{PaymentReceipt, PaymentRequest},
        products::{CreateProductRequest, ProductList, UpdateProductRequest},
    },
    models::{Cart, CartLine, Order, OrderItem, OrderStatus, Product, ProductSummary, User},
    response::{ApiResponse, Meta},
    routes::{cart, health, orders, params, payment, products, users},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        users::register,
        users::login,
        users::get_profile,
        users::update_profile,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        cart::get_cart,
        cart::add_to_cart,
        cart::update_cart_item,
        cart::remove_cart_item,
        cart::clear_cart,
        orders::create_order,
        orders::get_order,
        orders::list_orders,
        orders::update_order_status,
        orders::delete_order,
        orders::get_order_status,
        payment::process_payment
    ),
    components(
        schemas(
            User,
            Product,
            ProductSummary,
            Cart,
            CartLine,
            Order,
            OrderItem,
            OrderStatus,
            RegisterRequest,
            UpdateProfileRequest,
            LoginRequest,
            LoginResponse,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddToCartRequest,
            UpdateCartItemRequest,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            OrderStatusView,
            DeleteOrderResult,
            PaymentRequest,
            PaymentReceipt,
            params::ProductQuery,
            params::OrderListQuery,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Cart>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Users", description = "Registration, login and profile"),
        (name = "Products", description = "Product catalog"),
        (name = "Cart", description = "Shopping cart of the current user"),
        (name = "Orders", description = "Checkout and order lifecycle"),
        (name = "Payment", description = "Simulated card payment"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

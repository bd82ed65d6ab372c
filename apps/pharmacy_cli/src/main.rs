use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    config::load_settings,
    guard::GuardView,
    store::{
        AppState, OrderFilters, OrdersAction, SessionAction, SortDirection, SortField,
        AI_SUGGESTIONS_FLAG,
    },
    validation::{LoginForm, OrderForm, ProductSelection, SignupForm},
    ClientApp, HistoryNavigator, Navigator, Route,
};
use shared::{
    domain::{DeliveryPreference, OrderId, OrderStatus},
    protocol::OrderQuery,
};
use tracing::{debug, warn};

#[derive(Parser, Debug)]
#[command(about = "Terminal front-end for the pharmacy ordering service")]
struct Cli {
    /// Overrides the configured API base URL.
    #[arg(long)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    Logout,
    Whoami,
    Orders {
        #[arg(long)]
        status: Option<OrderStatus>,
        #[arg(long)]
        delivery: Option<DeliveryPreference>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value = "created_at")]
        sort_by: String,
        #[arg(long, default_value = "desc")]
        order: String,
    },
    Suggest {
        #[arg(long)]
        summary: String,
        #[arg(long)]
        address: Option<String>,
        #[arg(long, default_value = "IN_STORE")]
        delivery: DeliveryPreference,
    },
    Create {
        #[arg(long)]
        summary: String,
        #[arg(long)]
        delivery: DeliveryPreference,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        postal_code: Option<String>,
        /// Ask for AI suggestions first and attach all of them.
        #[arg(long)]
        with_suggestions: bool,
    },
    Update {
        #[arg(long)]
        id: i64,
        #[arg(long)]
        status: OrderStatus,
    },
    /// Shows one order with the products attached at creation.
    Show {
        #[arg(long)]
        id: i64,
    },
    Flags,
}

impl Command {
    fn page(&self) -> Option<Route> {
        match self {
            Command::Login { .. } => Some(Route::Login),
            Command::Signup { .. } => Some(Route::Signup),
            Command::Logout => None,
            _ => Some(Route::Dashboard),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings();
    if let Some(api_url) = cli.api_url.clone() {
        settings.api_url = api_url;
    }
    tracing_subscriber::fmt()
        .with_env_filter(settings.log_filter.as_str())
        .with_writer(std::io::stderr)
        .init();

    let navigator = Arc::new(HistoryNavigator::new());
    let app = ClientApp::from_settings(settings, navigator)?;
    app.start()?;
    app.idle().await;

    if let Some(page) = cli.command.page() {
        let guard = app.guard(page);
        if guard.view() == GuardView::Loading {
            let target = app.navigator().current().map(Route::path).unwrap_or("?");
            bail!("{} is not available right now (redirected to {target})", page.path());
        }
    }

    run(&app, cli.command).await
}

async fn run(app: &ClientApp, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let request = LoginForm { email, password }.into_request()?;
            app.dispatch(SessionAction::LoginRequested(request))?;
            app.idle().await;
            let state = app.state();
            if let Some(error) = state.session.error {
                bail!("login failed: {error}");
            }
            if let Some(user) = state.session.user {
                println!("logged in as {} <{}>", user.display_name(), user.email);
            }
        }
        Command::Signup {
            email,
            password,
            first_name,
            last_name,
        } => {
            let request = SignupForm {
                first_name,
                last_name,
                email,
                confirm_password: password.clone(),
                password,
            }
            .into_request()?;
            app.dispatch(SessionAction::SignupRequested(request))?;
            app.idle().await;
            if let Some(error) = app.state().session.error {
                bail!("signup failed: {error}");
            }
            println!("account created, you can now log in");
        }
        Command::Logout => {
            app.dispatch(SessionAction::Logout)?;
            app.idle().await;
            println!("logged out");
        }
        Command::Whoami => {
            let user = match app.refresh_identity().await {
                Ok(user) => Some(user),
                Err(err) if err.is_unauthorized() => bail!("session expired, please log in again"),
                Err(err) => {
                    warn!("could not refresh identity, using stored copy: {err}");
                    app.state().session.user
                }
            };
            match user {
                Some(user) => {
                    println!("user_id={} {} <{}>", user.id, user.display_name(), user.email)
                }
                None => println!("signed in, identity unknown"),
            }
        }
        Command::Orders {
            status,
            delivery,
            search,
            sort_by,
            order,
        } => {
            let direction = SortDirection::parse(&order)
                .with_context(|| format!("sort order must be asc or desc, got '{order}'"))?;
            fetch_orders(app).await?;
            app.dispatch(OrdersAction::SetFilters(OrderFilters {
                status,
                delivery_preference: delivery,
                search,
            }))?;
            app.dispatch(OrdersAction::SetSorting {
                field: SortField::parse(&sort_by),
                direction,
            })?;
            print_orders(&app.state());
        }
        Command::Suggest {
            summary,
            address,
            delivery,
        } => {
            ensure_suggestions_enabled(&app.state())?;
            let mut form = OrderForm::new(summary);
            form.set_delivery_preference(delivery);
            form.delivery_address = address.unwrap_or_default();
            app.dispatch(OrdersAction::SuggestionsRequested(form.suggestions_request()?))?;
            app.idle().await;
            let state = app.state();
            if let Some(error) = state.orders.error {
                bail!("{error}");
            }
            for product in &state.orders.ai_suggestions {
                println!(
                    "{:<24} x{:<3} {:>8}  {}",
                    product.name,
                    product.quantity,
                    product.price,
                    product.reason.as_deref().unwrap_or("")
                );
            }
        }
        Command::Create {
            summary,
            delivery,
            address,
            postal_code,
            with_suggestions,
        } => {
            let mut form = OrderForm::new(summary);
            form.set_delivery_preference(delivery);
            form.delivery_address = address.unwrap_or_default();
            form.postal_code = postal_code.unwrap_or_default();

            let mut selection = ProductSelection::default();
            if with_suggestions {
                ensure_suggestions_enabled(&app.state())?;
                app.dispatch(OrdersAction::SuggestionsRequested(form.suggestions_request()?))?;
                app.idle().await;
                for product in &app.state().orders.ai_suggestions {
                    selection.toggle(product);
                }
                debug!(total = %selection.total(), "attaching suggested products");
            }

            let request = form.into_create_request(selection.into_products())?;
            app.dispatch(OrdersAction::CreateRequested(request))?;
            app.idle().await;
            let state = app.state();
            if let Some(error) = state.orders.error {
                bail!("{error}");
            }
            if let Some(order) = state.orders.orders.first() {
                println!("created order_id={} status={}", order.id, order.status.as_str());
            }
        }
        Command::Update { id, status } => {
            fetch_orders(app).await?;
            let id = OrderId(id);
            app.dispatch(OrdersAction::UpdateRequested { id, status })?;
            app.idle().await;
            let state = app.state();
            if let Some(error) = state.orders.error {
                bail!("{error}");
            }
            match state.orders.find(id) {
                Some(order) => println!("order_id={} status={}", order.id, order.status.as_str()),
                None => bail!("order {id} is not in your order list"),
            }
        }
        Command::Show { id } => {
            fetch_orders(app).await?;
            let id = OrderId(id);
            let order = match app.view_order(id).await {
                Ok(order) => order,
                Err(err) if err.is_not_found() => bail!("order {id} does not exist"),
                Err(err) => bail!("{}", err.user_message("Failed to load order")),
            };
            println!(
                "order_id={} status={} delivery={} created={}",
                order.id,
                order.status.as_str(),
                order.delivery_preference.as_str(),
                order.created_at.format("%Y-%m-%d %H:%M")
            );
            println!("summary: {}", order.summary);
            if let Some(address) = &order.delivery_address {
                let postal_code = order.postal_code.as_deref().unwrap_or("");
                println!("address: {address} {postal_code}");
            }
            for product in order.suggested_products() {
                println!(
                    "  {:<24} x{:<3} {:>8}  {}",
                    product.name,
                    product.quantity,
                    product.line_total(),
                    product.reason.as_deref().unwrap_or("")
                );
            }
            app.dispatch(OrdersAction::ClearSelectedOrder)?;
        }
        Command::Flags => {
            let state = app.state();
            if let Some(error) = state.feature_flags.error {
                bail!("{error}");
            }
            for (name, enabled) in &state.feature_flags.flags {
                println!("{name}={enabled}");
            }
        }
    }
    Ok(())
}

async fn fetch_orders(app: &ClientApp) -> Result<()> {
    app.dispatch(OrdersAction::FetchRequested(OrderQuery::default()))?;
    app.idle().await;
    if let Some(error) = app.state().orders.error {
        bail!("{error}");
    }
    Ok(())
}

fn ensure_suggestions_enabled(state: &AppState) -> Result<()> {
    if !state.feature_flags.is_enabled(AI_SUGGESTIONS_FLAG) {
        bail!("AI suggestions are turned off for this account");
    }
    Ok(())
}

fn print_orders(state: &AppState) {
    let orders = &state.orders;
    for order in orders.visible_orders() {
        println!(
            "#{:<5} {:<10} {:<9} {}  {}",
            order.id,
            order.status.as_str(),
            order.delivery_preference.as_str(),
            order.created_at.format("%Y-%m-%d %H:%M"),
            order.summary
        );
    }
    let stats = orders.stats;
    println!(
        "total={} pending={} processing={} completed={} cancelled={}",
        stats.total, stats.pending, stats.processing, stats.completed, stats.cancelled
    );
}

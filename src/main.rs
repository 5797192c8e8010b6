use actix_web::{web, App, HttpServer};
use mongodb::Collection;

mod catalog;
mod config;
mod db;
mod errors;
mod middleware;
mod models;
mod orders;
mod routes;
mod seed;
mod users;

use catalog::{CatalogStore, MongoCatalog};
use middleware::RequireAuth;
use models::Favourite;
use orders::{MongoOrders, OrderService};
use users::UserStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init();

    let config = config::Config::from_env();
    let database = db::connect(&config)
        .await
        .expect("Failed to connect to MongoDB");
    db::ensure_indexes(&database)
        .await
        .expect("Failed to create user indexes");

    if config.reset_database {
        seed::populate(&database, config.db_timeout)
            .await
            .expect("Database seeding failed");
    }

    let user_store = UserStore::new(database.collection("users"), config.db_timeout);
    let catalog_store = CatalogStore::new(MongoCatalog::new(
        database.collection("products"),
        database.collection("designers"),
        config.db_timeout,
    ));
    let order_service = OrderService::new(MongoOrders::new(
        database.collection("orders"),
        user_store.clone(),
        config.db_timeout,
    ));
    let favourites: Collection<Favourite> = database.collection("favourites");

    let bind_addr = config.bind_addr.clone();
    log::info!("listening on {}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(user_store.clone()))
            .app_data(web::Data::new(catalog_store.clone()))
            .app_data(web::Data::new(order_service.clone()))
            .app_data(web::Data::new(favourites.clone()))
            .configure(routes::public)
            .service(
                web::scope("")
                    .wrap(RequireAuth::new(user_store.clone()))
                    .configure(routes::protected),
            )
    })
    .bind(bind_addr)?
    .run()
    .await
}

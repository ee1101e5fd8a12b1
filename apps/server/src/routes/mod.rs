use actix_web::web::ServiceConfig;

mod health;
mod ws;

pub fn routes(cfg: &mut ServiceConfig) {
    cfg.configure(health::routes).configure(ws::routes);
}

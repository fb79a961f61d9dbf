use actix_web::web::{self};

pub mod routes {
    pub mod data;
    pub mod sub;
}

pub mod services {
    pub mod notify;
    pub mod sub;
    pub mod sweep;
}

pub mod dtos {
    pub mod sub;
}

/// Metered data scope. Wrap it with `limiter::metering_middleware`.
pub fn mount_data() -> actix_web::Scope {
    web::scope("/data/user/{user_id}").service(routes::data::get_data)
}
pub fn mount_upgrade() -> actix_web::Scope {
    web::scope("/upgrade").service(routes::sub::post_upgrade)
}
pub fn mount_subs() -> actix_web::Scope {
    web::scope("/subscription").service(routes::sub::get_subscription)
}

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod router;
pub mod state;

pub mod crypto {
    pub mod secrets;
    pub mod token;
}

pub mod models {
    pub mod principal;
    pub mod rate;
    pub mod session;
}

pub mod repositories {
    pub mod memory;
    pub mod postgres;
    pub mod store;
}

pub mod services {
    pub mod credentials;
    pub mod rate_limit;
    pub mod session;
    pub mod verification;
}

pub mod handlers {
    pub mod auth;
    pub mod verification;
}

pub mod middleware_layer {
    pub mod auth;
    pub mod rate_limit;
    pub mod trust;
}

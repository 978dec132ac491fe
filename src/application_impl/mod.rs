mod token_refresher_http;
mod token_store_impl;

pub use token_refresher_http::*;
pub use token_store_impl::*;

pub mod body;
pub mod builders;
pub mod headers;
pub mod services;
pub mod tokens;
pub mod urls;

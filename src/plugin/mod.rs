pub mod installer;
pub mod manifest;
pub mod packager;
pub mod prompt;
pub mod schema;
pub mod validator;

pub mod camera;
pub mod files;
pub mod preferences;
pub mod resolver;
pub mod sqlite;

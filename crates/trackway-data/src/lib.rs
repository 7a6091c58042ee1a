//! On-disk inputs for the route compiler: parser options, catalog manifests
//! and route script files.

pub mod loader;
pub mod schema;

pub use loader::{
    DataLoadError, RouteProject, RouteSource, load_catalog, load_options, load_route_project,
    load_route_source,
};

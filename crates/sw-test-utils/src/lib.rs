// sw-test-utils: Shared test utilities for the broadcaster and viewer.
//
// Provides a scripted push server (stands in for the broadcaster when testing
// the viewer) and a bare viewer client (stands in for a browser when testing
// the broadcaster).

pub mod mock_viewer;
pub mod mock_ws_server;

pub use mock_viewer::MockViewer;
pub use mock_ws_server::{Frame, MockWsServer};

//! REST API implementation using rouille.
//!
//! GET endpoints read snapshots from [`SharedTourState`]; POST endpoints turn
//! into [`ApiCommand`]s delivered to the host loop over a channel. Handlers
//! never touch the tour directly: the host loop is the only writer.

use crate::catalog::{Catalog, PoiMeta};
use crate::core::player::{Session, TourEvent};
use crate::core::preloader::LoadRecord;
use crate::core::progress_driver::ProgressSnapshot;
use crate::core::tour::TourPhase;
use anyhow::anyhow;
use crossbeam_channel::{Receiver, Sender, unbounded};
use rouille::{Request, Response};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::thread;

/// Commands sent from API handlers to the host loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiCommand {
    /// User input or playback signal for the player
    Tour(TourEvent),
    /// Retry a failed loading phase
    Reload,
}

/// Tour state for `GET /api/status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub phase: TourPhase,
    pub progress: ProgressSnapshot,
    pub session: Option<Session>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<&'static str>,
    /// Bumped whenever the session changes
    pub revision: u64,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            phase: TourPhase::Idle,
            progress: ProgressSnapshot::default(),
            session: None,
            failure: None,
            revision: 0,
        }
    }
}

/// Shared state readable by API handlers (updated by the host loop)
#[derive(Default)]
pub struct SharedTourState {
    pub status: RwLock<StatusSnapshot>,
    pub preload: RwLock<Vec<LoadRecord>>,
    pub preload_in_flight: AtomicUsize,
}

impl SharedTourState {
    pub fn status(&self) -> StatusSnapshot {
        self.status.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_status(&self, status: StatusSnapshot) {
        *self.status.write().unwrap_or_else(|e| e.into_inner()) = status;
    }

    pub fn set_preload(&self, records: Vec<LoadRecord>, in_flight: usize) {
        *self.preload.write().unwrap_or_else(|e| e.into_inner()) = records;
        self.preload_in_flight.store(in_flight, Ordering::Release);
    }
}

#[derive(Serialize)]
struct CatalogResponse<'a> {
    pois: Vec<&'a PoiMeta>,
    assets: usize,
}

#[derive(Serialize)]
struct PreloadResponse<'a> {
    settled: usize,
    total: usize,
    /// Worker jobs still queued or running
    in_flight: usize,
    records: &'a [LoadRecord],
}

/// Generic API response
#[derive(Serialize)]
struct ApiResponse {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ApiResponse {
    fn ok() -> Self {
        Self { success: true, message: None, error: None }
    }

    fn ok_msg(msg: &str) -> Self {
        Self { success: true, message: Some(msg.to_string()), error: None }
    }

    fn err(msg: &str) -> Self {
        Self { success: false, message: None, error: Some(msg.to_string()) }
    }
}

/// REST API server
pub struct ApiServer {
    state: Arc<SharedTourState>,
    catalog: Arc<Catalog>,
    command_tx: Sender<ApiCommand>,
}

impl ApiServer {
    /// Bind `port` and serve on a background thread.
    /// Returns the command receiver for the host loop and the bound address.
    pub fn start(
        port: u16,
        state: Arc<SharedTourState>,
        catalog: Arc<Catalog>,
    ) -> anyhow::Result<(Receiver<ApiCommand>, SocketAddr)> {
        let (tx, rx) = unbounded();
        let api = ApiServer {
            state,
            catalog,
            command_tx: tx,
        };

        let addr = format!("0.0.0.0:{}", port);
        let server = rouille::Server::new(&addr, move |request| api.handle_request(request))
            .map_err(|e| anyhow!("Failed to bind API server on {}: {}", addr, e))?;
        let bound = server.server_addr();
        log::info!("API server listening on http://{}", bound);

        thread::Builder::new()
            .name("tourplay-api".into())
            .spawn(move || server.run())?;

        Ok((rx, bound))
    }

    fn handle_request(&self, request: &Request) -> Response {
        if request.method() == "OPTIONS" {
            return Response::empty_204()
                .with_additional_header("Access-Control-Allow-Origin", "*")
                .with_additional_header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
                .with_additional_header("Access-Control-Allow-Headers", "Content-Type");
        }

        // /api/poi/{id} needs the path parameter validated against the catalog
        let path = request.url();
        if request.method() == "POST"
            && let Some(id_str) = path.strip_prefix("/api/poi/")
        {
            return self.select_poi(id_str).with_additional_header("Access-Control-Allow-Origin", "*");
        }

        let response = rouille::router!(request,
            (GET) ["/api/status"] => {
                Response::json(&self.state.status())
            },
            (GET) ["/api/catalog"] => {
                Response::json(&CatalogResponse {
                    pois: self.catalog.pois().collect(),
                    assets: self.catalog.pair_count(),
                })
            },
            (GET) ["/api/preload"] => {
                let records = self.state.preload.read().unwrap_or_else(|e| e.into_inner());
                Response::json(&PreloadResponse {
                    settled: records.iter().filter(|r| r.loaded).count(),
                    total: records.len(),
                    in_flight: self.state.preload_in_flight.load(Ordering::Acquire),
                    records: &records,
                })
            },
            (GET) ["/api/health"] => {
                Response::json(&ApiResponse::ok_msg("tourplay API server"))
            },

            (POST) ["/api/return"] => {
                self.send_command(ApiCommand::Tour(TourEvent::RequestReturn))
            },
            (POST) ["/api/demo"] => {
                self.send_command(ApiCommand::Tour(TourEvent::RequestDemo))
            },
            (POST) ["/api/close"] => {
                self.send_command(ApiCommand::Tour(TourEvent::CloseDescription))
            },
            (POST) ["/api/finished"] => {
                self.send_command(ApiCommand::Tour(TourEvent::PlaybackFinished))
            },
            (POST) ["/api/reload"] => {
                self.send_command(ApiCommand::Reload)
            },

            _ => {
                Response::json(&ApiResponse::err("Not found")).with_status_code(404)
            }
        );

        response.with_additional_header("Access-Control-Allow-Origin", "*")
    }

    fn select_poi(&self, id_str: &str) -> Response {
        match id_str.parse::<u32>() {
            Ok(id) if self.catalog.contains_poi(id) => {
                self.send_command(ApiCommand::Tour(TourEvent::SelectPoi(id)))
            }
            Ok(id) => Response::json(&ApiResponse::err(&format!("Unknown POI {}", id))).with_status_code(404),
            Err(_) => Response::json(&ApiResponse::err("Invalid POI id")).with_status_code(400),
        }
    }

    fn send_command(&self, cmd: ApiCommand) -> Response {
        match self.command_tx.send(cmd) {
            Ok(_) => Response::json(&ApiResponse::ok()),
            Err(e) => Response::json(&ApiResponse::err(&format!("Failed to send command: {}", e)))
                .with_status_code(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::catalog_with;
    use std::io::Read;

    fn api() -> (ApiServer, Receiver<ApiCommand>) {
        let (tx, rx) = unbounded();
        let api = ApiServer {
            state: Arc::new(SharedTourState::default()),
            catalog: Arc::new(catalog_with(3)),
            command_tx: tx,
        };
        (api, rx)
    }

    fn call(api: &ApiServer, method: &str, url: &str) -> (u16, String) {
        let request = Request::fake_http(method, url, vec![], vec![]);
        let response = api.handle_request(&request);
        let status = response.status_code;
        let (mut reader, _) = response.data.into_reader_and_size();
        let mut body = String::new();
        reader.read_to_string(&mut body).unwrap();
        (status, body)
    }

    #[test]
    fn test_select_poi() {
        let (api, rx) = api();
        let (status, _) = call(&api, "POST", "/api/poi/2");
        assert_eq!(status, 200);
        assert_eq!(rx.try_recv().unwrap(), ApiCommand::Tour(TourEvent::SelectPoi(2)));
    }

    #[test]
    fn test_select_unknown_poi_rejected() {
        let (api, rx) = api();
        assert_eq!(call(&api, "POST", "/api/poi/9").0, 404);
        assert_eq!(call(&api, "POST", "/api/poi/abc").0, 400);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_control_endpoints() {
        let (api, rx) = api();
        for (url, expected) in [
            ("/api/return", ApiCommand::Tour(TourEvent::RequestReturn)),
            ("/api/demo", ApiCommand::Tour(TourEvent::RequestDemo)),
            ("/api/close", ApiCommand::Tour(TourEvent::CloseDescription)),
            ("/api/finished", ApiCommand::Tour(TourEvent::PlaybackFinished)),
            ("/api/reload", ApiCommand::Reload),
        ] {
            assert_eq!(call(&api, "POST", url).0, 200, "{}", url);
            assert_eq!(rx.try_recv().unwrap(), expected);
        }
    }

    #[test]
    fn test_status_reflects_shared_state() {
        let (api, _rx) = api();
        let (status, body) = call(&api, "GET", "/api/status");
        assert_eq!(status, 200);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["phase"], "idle");
        assert!(json["session"].is_null());

        api.state.set_status(StatusSnapshot {
            phase: TourPhase::Ready,
            session: Some(Session::default()),
            revision: 3,
            ..StatusSnapshot::default()
        });
        let (_, body) = call(&api, "GET", "/api/status");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["phase"], "ready");
        assert_eq!(json["session"]["state"]["state"], "start");
        assert_eq!(json["session"]["show_rest_frame"], true);
        assert_eq!(json["revision"], 3);
    }

    #[test]
    fn test_catalog_endpoint() {
        let (api, _rx) = api();
        let (_, body) = call(&api, "GET", "/api/catalog");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["pois"].as_array().map(|a| a.len()), Some(3));
        assert_eq!(json["assets"], 8);
        assert_eq!(json["pois"][0]["title"], "Hotspot 1");
    }

    #[test]
    fn test_unknown_route() {
        let (api, _rx) = api();
        assert_eq!(call(&api, "GET", "/api/nope").0, 404);
    }

    #[test]
    fn test_preload_endpoint() {
        let (api, _rx) = api();
        let records: Vec<LoadRecord> = ["mem://demo/forward", "mem://demo/reverse"]
            .iter()
            .enumerate()
            .map(|(i, url)| LoadRecord {
                id: crate::catalog::AssetId::Demo,
                direction: crate::catalog::Direction::ALL[i],
                url: url.to_string(),
                loaded: i == 0,
                outcome: (i == 0).then_some(crate::core::preloader::LoadOutcome::Buffered),
                probe_ok: Some(true),
            })
            .collect();
        api.state.set_preload(records, 1);

        let (status, body) = call(&api, "GET", "/api/preload");
        assert_eq!(status, 200);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["settled"], 1);
        assert_eq!(json["total"], 2);
        assert_eq!(json["in_flight"], 1);
        assert_eq!(json["records"][0]["outcome"], "buffered");
        assert!(json["records"][1]["outcome"].is_null());
    }
}

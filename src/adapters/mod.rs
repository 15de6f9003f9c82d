//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements                  | Connects to               |
//! |---------------|-----------------------------|---------------------------|
//! | `board`       | Board (all four below)      | bundles probe/time/http   |
//! | `credentials` | CredentialStore             | build-time environment    |
//! | `http`        | HttpClient                  | ESP-IDF HTTP(S) / sim     |
//! | `log_sink`    | EventSink                   | Serial log output         |
//! | `network`     | ConnectivityProbe           | TCP connect               |
//! | `nvs`         | CredentialStore             | NVS / in-memory store     |
//! | `time`        | TimeSource, MonotonicClock  | SNTP + esp_timer / RTC    |

pub mod board;
pub mod credentials;
pub mod http;
pub mod log_sink;
pub mod network;
pub mod nvs;
pub mod time;

//! # wechat-relay
//!
//! WeChat official account callback that answers user messages with a local
//! Ollama model.
//!
//! ## How it works
//!
//! 1. WeChat verifies ownership of the callback with `GET /wx?signature=..&timestamp=..&nonce=..&echostr=..`.
//!    The signature is SHA-1 over the sorted `token`, `timestamp` and `nonce`; on
//!    a match the server echoes `echostr`, otherwise it answers `403 forbidden`.
//! 2. User messages arrive as `POST /wx` with the same query signature and an
//!    XML envelope body.
//! 3. Text messages are sent to Ollama's `/api/chat` as a single user turn with
//!    a short timeout. Reasoning markup (`<think>...</think>`) is stripped from
//!    the answer.
//! 4. The answer goes back synchronously as a passive-reply XML envelope.
//!
//! Only an invalid signature (`403`) or an unparsable envelope (`400`) produce a
//! non-`200` status. Non-text messages, empty messages and backend failures all
//! get a fixed reply, because WeChat re-delivers anything it does not get a
//! timely `200` for.
//!
//! ## Configuration (env vars)
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `WECHAT_TOKEN` | required | Token configured in the WeChat admin console |
//! | `OLLAMA_URL` | required | Ollama chat endpoint (`http://127.0.0.1:11434/api/chat`) |
//! | `OLLAMA_MODEL` | required | Model name |
//! | `RELAY_HOST` | `127.0.0.1` | Bind host (IP address or name) |
//! | `RELAY_PORT` | `80` | HTTP listening port |
//! | `RELAY_PATH` | `/wx` | Callback path |
//! | `OLLAMA_TIMEOUT_MS` | `4500` | Inference timeout |
//! | `OLLAMA_STYLE` | unset | Style directive appended to the system prompt |
//! | `OLLAMA_KEEP_ALIVE` | unset | Forwarded as `keep_alive` |
//! | `OLLAMA_OPTIONS` | unset | JSON object forwarded as `options` |
//! | `TUNNEL_COMMAND` | unset | Tunnel client to launch at start-up |
//! | `TUNNEL_DISABLED` | `false` | Skip launching the tunnel |
//!
//! The binary also reads a `config.env` file and accepts CLI overrides; see
//! `wechat-relay --help`.

pub mod clock;
pub mod config;
pub mod env;
pub mod envelope;
pub mod error;
pub mod ollama;
pub mod sanitize;
pub mod server;
pub mod signal;
pub mod signature;
pub mod tunnel;

pub use config::RelayConfig;
pub use server::{AppState, router, serve};

// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) uses these modules to implement the `rentry` command.
//
// Module responsibilities:
// - `api`: the session with the rentry service (CSRF handshake, cookie
//   jar) and the five operations against its HTTP API.
// - `cli`: the clap argument surface, per-command flows and all terminal
//   output.
//
// Keeping this separation lets the client be used as a library and lets
// the integration tests drive `api` without going through the binary.
pub mod api;
pub mod cli;

//! Purpose: Client library for the API gateway management backend, shared by `apigw` and tests.
//! Exports: `api` (client, options, DTOs), `core` (errors, config, registry), `notice`.
//! Role: Library backing the CLI; embedders use `api` and pass their own registry and hooks.
//! Invariants: No process-global request state; all of it hangs off owned values.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
pub mod notice;

#![allow(dead_code)]

//! Fakes and fixtures shared by the integration tests.

pub mod adjudicator;
pub mod cipher;
pub mod events;
pub mod fixtures;
pub mod harness;
pub mod sandbox;
pub mod stores;

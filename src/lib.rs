#![cfg_attr(not(any(test, feature = "std")), no_std)]

//! trail_mapper - concurrency runtime for a handheld GPS trail-mapping device
//!
//! The crate ties together a serial GPS receiver, a flash filesystem with a
//! single open file at a time, a slow e-paper display driven from a second
//! execution context, and a minimal HTTP control surface, all running on one
//! cooperative executor.

extern crate alloc;

// Platform abstraction layer (serial, storage, network, display, gpio, rtc)
pub mod platform;

// Core runtime primitives (file lock, offload queue, device state, logging)
pub mod core;

// Device drivers built on the platform traits
pub mod devices;

// Track logs and persisted JSON indices
pub mod tracks;

// Minimal HTTP/1.0 request/response cycle
pub mod http;

// Trail recording state machine
pub mod recorder;

// Render jobs and the offload renderer
pub mod display;

// HTTP handlers and button actions for the device
pub mod app;

// Runtime tunables loaded from the device volume
pub mod config;

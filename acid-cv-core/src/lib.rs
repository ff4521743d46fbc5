//! # acid-cv-core
//!
//! Hardware independent parts of a CV-driven acid bass voice.
//!
//! A raw pitch CV sample is converted to volts with a field calibrated linear curve, quantized to a note number, and
//! then played on a monophonic [`voice::Voice`] either as a fresh note or as a legato slide. The calibration curve is
//! measured by a short button-guided procedure and persisted through a [`storage::CalibrationStorage`].
//!
//! Everything here is `no_std` and advanced one control tick at a time, the firmware supplies a
//! [`controls::ControlFrame`] each tick and the [`controller::Controller`] does the rest.

#![cfg_attr(not(test), no_std)]

pub mod analog_voice;
pub mod averager;
pub mod calibration;
pub mod config;
pub mod controller;
pub mod controls;
pub mod curve;
pub mod debounce;
pub mod error;
pub mod gate;
pub mod modes;
pub mod notes;
pub mod pitch;
pub mod storage;
pub mod voice;

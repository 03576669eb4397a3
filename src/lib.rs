// src/lib.rs
#![deny(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod util;
pub mod config;

pub mod entry;
pub mod header;
pub mod rules;
pub mod duplicates;

pub mod walker;
pub mod folder;
pub mod nonsource;
pub mod detect;
pub mod snapshot;
pub mod diff;

pub mod tree_view;
pub mod map_view;

pub mod lint;
pub mod scaffold;

pub mod cli;
pub mod commands;

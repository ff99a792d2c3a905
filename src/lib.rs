#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]
#![allow(clippy::large_enum_variant)]

pub mod app;
pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod remote;
pub mod settings;

pub use project::{EditorError, Project};

// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

pub mod align;
pub mod annotation;
pub mod config;
pub mod constant;
pub mod error;
pub mod io;
pub mod mask;
pub mod render;
pub mod ut;
pub mod windows;

// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

pub mod annotations;
pub mod render;
pub mod track;

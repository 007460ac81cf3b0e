// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

pub mod engine;
pub mod logits;
pub mod pipeline;
pub mod sidecar;

// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod api_client;
pub mod fetcher;
pub mod pager;
pub mod reqwest_engine;
pub mod request_window;
pub mod traits;

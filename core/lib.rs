#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

pub mod config;
pub mod report;

#[path = "../data/mod.rs"]
pub mod data;

#[path = "../select/mod.rs"]
pub mod select;

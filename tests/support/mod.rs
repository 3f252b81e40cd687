#![allow(dead_code)]

pub mod dataset;
pub mod experiment;

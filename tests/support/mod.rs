#![allow(dead_code)]

pub mod dynprice_env;
pub mod orders;

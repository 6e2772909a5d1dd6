// src/models/mod.rs

pub mod alert;
pub mod candidate;
pub mod exam_record;
pub mod question;

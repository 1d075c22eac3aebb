//! Mantém URLs "acordadas": um scheduler periódico faz GET em cada alvo
//! ativo e contabiliza tentativas e sucessos num store durável.

pub mod api;
pub mod config;
pub mod error;
pub mod ping;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod types;

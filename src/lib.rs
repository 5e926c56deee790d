//! Relatórios de uptime/downtime de lojas a partir de polls esparsos.
//!
//! Para cada loja o cálculo cruza os polls `active`/`inactive`, o horário
//! comercial local e o fuso da loja, e estima quanto tempo ela ficou ativa na
//! última hora, no último dia e na última semana.

pub mod aggregate;
pub mod artifact;
pub mod calendar;
pub mod config;
pub mod error;
pub mod jobs;
pub mod report;
pub mod service;
pub mod storage;
pub mod timeline;
pub mod timezone;
pub mod types;
pub mod window;

// O núcleo da sincronização: funções puras, sem I/O. Os services orquestram
// storage e auditoria em volta delas.

pub mod identity;
pub mod merge;
pub mod project;
pub mod revision;
pub mod temporal;

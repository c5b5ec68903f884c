
// The LeCroy VICP protocol: length-prefixed, flag-tagged blocks exchanged with an instrument over TCP
pub mod vicp;

// Errors surfaced to whoever drives the oscilloscope
pub mod errors;

// Connection settings, loadable from JSON
pub mod config;

// The command/query interface an oscilloscope model is built on, and its VICP implementation
pub mod connection;

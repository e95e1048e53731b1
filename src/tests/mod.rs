//! Integration tests driving the workflow against the in-memory ledger


mod ordering_tests;

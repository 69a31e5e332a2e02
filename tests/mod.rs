//! Test suite for Hazel Sync
//!
//! This module organizes all tests

//! Session-location service (`islb.Islb`) consumed by biz nodes.

tonic::include_proto!("islb");

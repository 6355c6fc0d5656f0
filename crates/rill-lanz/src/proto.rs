//! Hand-maintained record schema, in the idiom of prost-generated code.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct LanzRecord {
    #[prost(message, optional, tag = "1")]
    pub config_record: ::core::option::Option<ConfigRecord>,
    #[prost(message, optional, tag = "2")]
    pub congestion_record: ::core::option::Option<CongestionRecord>,
    #[prost(message, optional, tag = "3")]
    pub error_record: ::core::option::Option<ErrorRecord>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConfigRecord {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(uint32, tag = "2")]
    pub lanz_version: u32,
    #[prost(uint32, tag = "3")]
    pub num_of_ports: u32,
    #[prost(uint32, tag = "4")]
    pub segment_size: u32,
    #[prost(uint32, tag = "5")]
    pub max_queue_size: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CongestionRecord {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(string, tag = "2")]
    pub intf_name: ::prost::alloc::string::String,
    #[prost(uint32, tag = "3")]
    pub switch_id: u32,
    #[prost(uint32, tag = "4")]
    pub port_id: u32,
    #[prost(uint32, tag = "5")]
    pub queue_size: u32,
    #[prost(enumeration = "congestion_record::EntryType", tag = "6")]
    pub entry_type: i32,
    #[prost(uint64, tag = "7")]
    pub time_of_max_queue_len: u64,
}

/// Nested message and enum types in `CongestionRecord`.
pub mod congestion_record {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum EntryType {
        Start = 0,
        Update = 1,
        End = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ErrorRecord {
    #[prost(uint64, tag = "1")]
    pub timestamp: u64,
    #[prost(string, tag = "2")]
    pub error_message: ::prost::alloc::string::String,
}

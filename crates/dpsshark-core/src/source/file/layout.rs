pub const PCAPNG_MAGIC: [u8; 4] = [0x0a, 0x0d, 0x0d, 0x0a];

/// Initial buffer handed to the pcap-parser readers; grown on demand.
pub const PCAP_READER_BUFFER_SIZE: usize = 65536;

//! Address mapping.
//!
//! A byte address is split into (channel, rank, bank, row, column) by
//! dropping the byte offset within one transaction and then peeling fields
//! off the low end in the order named by the configured scheme. Every
//! scheme is a bijection between aligned addresses and coordinate tuples,
//! so `compose` and `decompose` round-trip exactly.

use crate::config::{AddressMappingScheme, Config};

/// One field of the decomposed address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Channel,
    Rank,
    Bank,
    Row,
    Column,
}

impl AddressMappingScheme {
    /// Field order from low bits to high bits, above the byte offset.
    fn field_order(self) -> [Field; 5] {
        use Field::*;
        match self {
            AddressMappingScheme::Scheme1 => [Channel, Bank, Rank, Column, Row],
            AddressMappingScheme::Scheme2 => [Channel, Rank, Bank, Column, Row],
            AddressMappingScheme::Scheme3 => [Channel, Column, Rank, Bank, Row],
            AddressMappingScheme::Scheme4 => [Channel, Column, Bank, Rank, Row],
            AddressMappingScheme::Scheme5 => [Bank, Rank, Channel, Column, Row],
            AddressMappingScheme::Scheme6 => [Rank, Bank, Channel, Column, Row],
            AddressMappingScheme::Scheme7 => [Column, Channel, Bank, Rank, Row],
            AddressMappingScheme::Scheme8 => [Bank, Rank, Column, Row, Channel],
        }
    }
}

/// DRAM coordinates for one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedAddress {
    pub channel: u64,
    pub rank: u64,
    pub bank: u64,
    pub row: u64,
    pub column: u64,
}

/// Pure address-mapping function, specialized to one configuration.
#[derive(Debug, Clone)]
pub struct AddressMapper {
    scheme: AddressMappingScheme,
    chan_bits: u32,
    rank_bits: u32,
    bank_bits: u32,
    row_bits: u32,
    col_bits: u32,
    byte_offset_bits: u32,
}

impl AddressMapper {
    /// Builds a mapper from the resolved configuration.
    pub fn new(cfg: &Config) -> Self {
        Self {
            scheme: cfg.address_mapping_scheme,
            chan_bits: cfg.chan_bits,
            rank_bits: cfg.rank_bits,
            bank_bits: cfg.bank_bits,
            row_bits: cfg.row_bits,
            col_bits: cfg.col_bits,
            byte_offset_bits: cfg.byte_offset_bits,
        }
    }

    fn width(&self, field: Field) -> u32 {
        match field {
            Field::Channel => self.chan_bits,
            Field::Rank => self.rank_bits,
            Field::Bank => self.bank_bits,
            Field::Row => self.row_bits,
            Field::Column => self.col_bits,
        }
    }

    /// Clears the low-order bits that address bytes within one transaction.
    pub fn align(&self, address: u64) -> u64 {
        (address >> self.byte_offset_bits) << self.byte_offset_bits
    }

    /// Splits a byte address into DRAM coordinates.
    pub fn decompose(&self, address: u64) -> MappedAddress {
        let mut rest = address >> self.byte_offset_bits;
        let mut mapped = MappedAddress {
            channel: 0,
            rank: 0,
            bank: 0,
            row: 0,
            column: 0,
        };
        for field in self.scheme.field_order() {
            let bits = self.width(field);
            let value = rest & ((1u64 << bits) - 1);
            rest >>= bits;
            match field {
                Field::Channel => mapped.channel = value,
                Field::Rank => mapped.rank = value,
                Field::Bank => mapped.bank = value,
                Field::Row => mapped.row = value,
                Field::Column => mapped.column = value,
            }
        }
        mapped
    }

    /// Packs DRAM coordinates back into an aligned byte address. Inverse of
    /// [`decompose`](Self::decompose) on the valid-coordinate domain.
    pub fn compose(&self, mapped: MappedAddress) -> u64 {
        let mut address = 0u64;
        let mut shift = self.byte_offset_bits;
        for field in self.scheme.field_order() {
            let bits = self.width(field);
            let value = match field {
                Field::Channel => mapped.channel,
                Field::Rank => mapped.rank,
                Field::Bank => mapped.bank,
                Field::Row => mapped.row,
                Field::Column => mapped.column,
            };
            debug_assert!(bits == 64 || value < (1u64 << bits));
            address |= value << shift;
            shift += bits;
        }
        address
    }

    /// The channel a byte address routes to.
    pub fn channel_of(&self, address: u64) -> u64 {
        self.decompose(address).channel
    }
}

//! IOHC tile discovery
//!
//! Tiles are found by PCI ID, sorted by the lowest bus they host and split
//! into sockets of [`TILES_PER_SOCKET`]. PCI enumeration order says nothing
//! about the on-die tile numbering, so each tile's identity is taken from
//! the bus base the hardware reports in its IOHCMISC block.

use std::fmt;
use std::sync::Arc;

use hsmp_raw::current_arch::iohc::{self, NbBusNumCntl, MAX_BUS, MAX_TILES, TILES_PER_SOCKET};
use hsmp_raw::Register;

use crate::common::{PciAddress, PciDevice};
use crate::error::{HsmpError, Result};
use crate::smn::{self, ConfigSpace};

/// One IOHC root complex and the bus range it hosts
#[derive(Clone)]
pub struct Tile {
    device: Arc<dyn ConfigSpace>,
    pub address: PciAddress,
    /// Position in the sorted table
    pub index: usize,
    pub socket: usize,
    /// On-die tile number within the socket
    pub id: u8,
    pub bus_base: u8,
    /// Highest hosted bus, inclusive
    pub bus_limit: u8,
}

impl Tile {
    pub fn device(&self) -> &dyn ConfigSpace {
        self.device.as_ref()
    }

    pub fn hosts(&self, bus: u8) -> bool {
        (self.bus_base..=self.bus_limit).contains(&bus)
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tile")
            .field("address", &self.address)
            .field("index", &self.index)
            .field("socket", &self.socket)
            .field("id", &self.id)
            .field("bus_base", &format_args!("0x{:02X}", self.bus_base))
            .field("bus_limit", &format_args!("0x{:02X}", self.bus_limit))
            .finish()
    }
}

/// Fully resolved tile table, sorted by bus base
#[derive(Debug, Clone)]
pub struct Topology {
    tiles: Vec<Tile>,
}

impl Topology {
    /// Build the tile table from the IOHC devices of a PCI scan
    ///
    /// Either every tile is resolved or an error is returned; no partial
    /// table escapes.
    pub fn discover(mut devices: Vec<PciDevice>) -> Result<Self> {
        let count = devices.len();
        if count == 0 || count % TILES_PER_SOCKET != 0 || count > MAX_TILES {
            return Err(HsmpError::Topology(format!(
                "expected {} or {} IOHC devices, found {}",
                TILES_PER_SOCKET, MAX_TILES, count
            )));
        }

        devices.sort_by_key(|d| d.address.bus);

        if let Some(pair) = devices
            .windows(2)
            .find(|pair| pair[0].address.bus == pair[1].address.bus)
        {
            return Err(HsmpError::Topology(format!(
                "IOHC devices {} and {} share bus 0x{:02X}",
                pair[0].address, pair[1].address, pair[0].address.bus
            )));
        }

        if devices[0].address.bus != 0 {
            return Err(HsmpError::Topology(format!(
                "lowest IOHC is on bus 0x{:02X}, buses below it are unowned",
                devices[0].address.bus
            )));
        }

        let mut tiles: Vec<Tile> = devices
            .iter()
            .enumerate()
            .map(|(index, dev)| Tile {
                device: Arc::clone(&dev.config),
                address: dev.address,
                index,
                socket: index / TILES_PER_SOCKET,
                id: 0,
                bus_base: dev.address.bus,
                bus_limit: devices
                    .get(index + 1)
                    .map_or(MAX_BUS, |next| next.address.bus - 1),
            })
            .collect();

        let ids = Self::resolve_ids(&tiles)?;
        for (tile, id) in tiles.iter_mut().zip(ids) {
            tile.id = id;
        }

        for tile in &tiles {
            tracing::info!(
                "IOHC {}: bus 0x{:02X}-0x{:02X} -> socket {} tile {} ({})",
                tile.index,
                tile.bus_base,
                tile.bus_limit,
                tile.socket,
                tile.id,
                tile.address
            );
        }

        Ok(Self { tiles })
    }

    /// Ask each socket which bus base belongs to which on-die tile
    ///
    /// Entry `i` of the sorted table reads IOHCMISC`i % 4` through its own
    /// aperture; the reported bus base selects the table slot that receives
    /// tile number `i % 4`.
    fn resolve_ids(tiles: &[Tile]) -> Result<Vec<u8>> {
        let mut ids: Vec<Option<u8>> = vec![None; tiles.len()];

        for tile in tiles {
            let position = tile.index % TILES_PER_SOCKET;
            let mut reg: Register<NbBusNumCntl> =
                Register::with_address(iohc::smn::nb_bus_num_cntl(position));
            reg.from_reg_value(smn::smn_read(tile.device(), reg.address)?);
            let reported = reg.layout.bus_base;

            tracing::debug!(
                "Socket {} IOHCMISC{}: addr 0x{:08X} reports bus 0x{:02X}",
                tile.socket,
                position,
                reg.address,
                reported
            );

            let slot = tiles
                .iter()
                .position(|t| t.hosts(reported))
                .ok_or_else(|| {
                    HsmpError::Topology(format!(
                        "unable to map bus 0x{reported:02X} to an IOHC device"
                    ))
                })?;

            if tiles[slot].socket != tile.socket {
                return Err(HsmpError::Topology(format!(
                    "socket {} IOHCMISC{} reports bus 0x{:02X} of socket {}",
                    tile.socket, position, reported, tiles[slot].socket
                )));
            }

            if ids[slot].is_some() {
                return Err(HsmpError::Topology(format!(
                    "bus 0x{reported:02X} reported by more than one IOHCMISC block"
                )));
            }

            ids[slot] = Some(position as u8);
        }

        // Every read claimed a distinct slot of the same table, so all are set
        Ok(ids.into_iter().map(|id| id.unwrap_or_default()).collect())
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn socket_count(&self) -> usize {
        self.tiles.len() / TILES_PER_SOCKET
    }

    /// The tile carrying `socket`'s mailbox: its lowest-bus tile
    pub fn socket_tile(&self, socket: usize) -> Result<&Tile> {
        if socket >= self.socket_count() {
            return Err(HsmpError::InvalidArgument(format!(
                "socket {socket} is not present ({} sockets)",
                self.socket_count()
            )));
        }
        Ok(&self.tiles[socket * TILES_PER_SOCKET])
    }

    pub fn bus_to_tile(&self, bus: u8) -> Result<&Tile> {
        self.tiles
            .iter()
            .find(|t| t.hosts(bus))
            .ok_or_else(|| HsmpError::InvalidArgument(format!("bus 0x{bus:02X} has no IOHC")))
    }

    /// Bus cursor: the bus base at `index` and the index to pass next
    ///
    /// The continuation is 0 once the last tile has been returned, so a walk
    /// started at 0 visits every tile exactly once.
    pub fn next_bus(&self, index: usize) -> Result<(u8, usize)> {
        let tile = self.tiles.get(index).ok_or_else(|| {
            HsmpError::InvalidArgument(format!("bus index {index} out of range"))
        })?;

        let next = if index + 1 < self.tiles.len() {
            index + 1
        } else {
            0
        };

        Ok((tile.bus_base, next))
    }

    pub fn buses(&self) -> impl Iterator<Item = u8> + '_ {
        self.tiles.iter().map(|t| t.bus_base)
    }
}

//! Builders for packages with a fixed layout: `_PRT`, `_DSD`, `_CPC`,
//! `_PSD`, `_CSD`, `_PCT`, `_PSS`, `_CST` and `_LPI`.

use r_efi::efi;

use crate::AmlError;
use crate::name::NameString;
use crate::node::{AmlTree, NodeId};
use crate::opcode::PACKAGE_OP;

use super::resource::GenericAddress;

/// Number of entries in a revision 3 `_CPC` package.
const CPC_NUM_ENTRIES: u64 = 23;
/// `_CPC` package revision.
const CPC_REVISION: u64 = 3;
/// Number of entries in a `_PSD` dependency package.
const PSD_NUM_ENTRIES: u64 = 5;
/// Number of entries in a `_CSD` dependency package.
const CSD_NUM_ENTRIES: u64 = 6;
/// Revision of `_PSD` and `_CSD` dependency packages.
const DEPENDENCY_REVISION: u64 = 0;
/// Index of the state count in an `_LPI` package.
const LPI_COUNT_INDEX: usize = 2;

/// Valid `_PSD`/`_CSD` coordination types: `SW_ALL`, `SW_ANY`, `HW_ALL`.
const COORDINATION_TYPES: [u32; 3] = [0xFC, 0xFD, 0xFE];

/// One `_CPC` entry: an integer or a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpcEntry {
    /// Static value.
    Integer(u64),
    /// Register to read or write.
    Register(GenericAddress),
}

impl Default for CpcEntry {
    fn default() -> Self {
        Self::Register(GenericAddress::default())
    }
}

impl CpcEntry {
    fn is_null(&self) -> bool {
        match self {
            Self::Integer(value) => *value == 0,
            Self::Register(register) => register.is_null(),
        }
    }
}

/// Contents of a revision 3 `_CPC` package, in package order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct CpcInfo {
    pub highest_performance: CpcEntry,
    pub nominal_performance: CpcEntry,
    pub lowest_nonlinear_performance: CpcEntry,
    pub lowest_performance: CpcEntry,
    pub guaranteed_performance: CpcEntry,
    pub desired_performance: CpcEntry,
    pub minimum_performance: CpcEntry,
    pub maximum_performance: CpcEntry,
    pub performance_reduction_tolerance: CpcEntry,
    pub time_window: CpcEntry,
    pub counter_wraparound_time: CpcEntry,
    pub reference_performance_counter: CpcEntry,
    pub delivered_performance_counter: CpcEntry,
    pub performance_limited: CpcEntry,
    pub cppc_enable: CpcEntry,
    pub autonomous_selection_enable: CpcEntry,
    pub autonomous_activity_window: CpcEntry,
    pub energy_performance_preference: CpcEntry,
    pub reference_performance: CpcEntry,
    pub lowest_frequency: CpcEntry,
    pub nominal_frequency: CpcEntry,
}

impl CpcInfo {
    fn entries(&self) -> [&CpcEntry; 21] {
        [
            &self.highest_performance,
            &self.nominal_performance,
            &self.lowest_nonlinear_performance,
            &self.lowest_performance,
            &self.guaranteed_performance,
            &self.desired_performance,
            &self.minimum_performance,
            &self.maximum_performance,
            &self.performance_reduction_tolerance,
            &self.time_window,
            &self.counter_wraparound_time,
            &self.reference_performance_counter,
            &self.delivered_performance_counter,
            &self.performance_limited,
            &self.cppc_enable,
            &self.autonomous_selection_enable,
            &self.autonomous_activity_window,
            &self.energy_performance_preference,
            &self.reference_performance,
            &self.lowest_frequency,
            &self.nominal_frequency,
        ]
    }

    fn mandatory(&self) -> [&CpcEntry; 8] {
        [
            &self.highest_performance,
            &self.nominal_performance,
            &self.lowest_nonlinear_performance,
            &self.lowest_performance,
            &self.desired_performance,
            &self.reference_performance_counter,
            &self.delivered_performance_counter,
            &self.performance_limited,
        ]
    }
}

/// One `_CSD` dependency package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsdEntry {
    /// Dependency domain number.
    pub domain: u32,
    /// Coordination type (0xFC, 0xFD or 0xFE).
    pub coord_type: u32,
    /// Processors in the domain.
    pub num_processors: u32,
    /// Index of the C-state entry the dependency applies to.
    pub index: u32,
}

/// One `_PSS` performance state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PssState {
    /// Core frequency in MHz.
    pub core_frequency: u32,
    /// Power dissipation in mW.
    pub power: u32,
    /// Transition latency in us.
    pub latency: u32,
    /// Bus master latency in us.
    pub bus_master_latency: u32,
    /// Value written to the `_PCT` control register.
    pub control: u32,
    /// Value read back from the `_PCT` status register.
    pub status: u32,
}

/// One `_CST` C-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CstState {
    /// Entry register.
    pub register: GenericAddress,
    /// C-state type, 1 to 3.
    pub state_type: u8,
    /// Worst-case latency in us.
    pub latency: u16,
    /// Average power in mW.
    pub power: u32,
}

/// How an `_LPI` state is entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LpiEntryMethod {
    /// Write to a register.
    Register(GenericAddress),
    /// Integer handed to the platform entry method.
    Integer(u64),
}

/// One `_LPI` low power idle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LpiState<'a> {
    /// Minimum residency in us.
    pub min_residency: u32,
    /// Worst-case wakeup latency in us.
    pub worst_wakeup_latency: u32,
    /// Bit 0: the state is enabled.
    pub flags: u32,
    /// Architecture-specific context loss flags.
    pub arch_flags: u32,
    /// Residency counter frequency in Hz, 0 for a counter in the timebase.
    pub residency_counter_frequency: u32,
    /// Parent state enabled alongside this one, 0 for none.
    pub enable_parent_state: u32,
    /// Entry method.
    pub entry_method: LpiEntryMethod,
    /// Residency counter register, or null.
    pub residency_counter: GenericAddress,
    /// Usage counter register, or null.
    pub usage_counter: GenericAddress,
    /// State name.
    pub name: &'a str,
}

fn check_text(text: &str) -> Result<(), AmlError> {
    if text.is_ascii() && !text.contains('\0') { Ok(()) } else { Err(AmlError::OutOfRange) }
}

fn check_register(register: &GenericAddress) -> Result<(), AmlError> {
    if register.access_size > 4 { Err(AmlError::OutOfRange) } else { Ok(()) }
}

fn check_coordination(coord_type: u32, num_processors: u32) -> Result<(), AmlError> {
    if COORDINATION_TYPES.contains(&coord_type) && num_processors != 0 {
        Ok(())
    } else {
        Err(AmlError::OutOfRange)
    }
}

impl AmlTree {
    /// Attaches the detached `child` to `parent`, deleting it on failure.
    pub(crate) fn adopt_variable(&mut self, parent: NodeId, child: NodeId) -> Result<(), AmlError> {
        self.with_cleanup(child, |tree| tree.attach_node(parent, child))
    }

    /// Value of a `Name` holding a `Package`.
    fn named_package(&self, name_op: NodeId) -> Result<NodeId, AmlError> {
        let package = self.name_op_value_node(name_op)?;
        self.package_node(package)
    }

    fn package_node(&self, node: NodeId) -> Result<NodeId, AmlError> {
        if *self.encoding(node)? == PACKAGE_OP { Ok(node) } else { Err(AmlError::TypeMismatch) }
    }

    /// Builds a package with `fill`, then attaches it to `parent`.
    fn build_package(
        &mut self,
        parent: NodeId,
        fill: impl FnOnce(&mut Self, NodeId) -> Result<(), AmlError>,
    ) -> Result<NodeId, AmlError> {
        let package = self.new_package()?;
        self.with_cleanup(package, |tree| {
            fill(tree, package)?;
            tree.attach_node(parent, package)
        })?;
        Ok(package)
    }

    /// `Name (name, Package () {...})` filled by `fill`.
    fn named_package_with(
        &mut self,
        name: &str,
        parent: Option<NodeId>,
        fill: impl FnOnce(&mut Self, NodeId) -> Result<(), AmlError>,
    ) -> Result<NodeId, AmlError> {
        let name = NameString::from_asl(name)?;
        let package = self.new_package()?;
        self.with_cleanup(package, |tree| fill(tree, package))?;
        let id = self.new_name_op(&name, package)?;
        self.link(id, parent)
    }

    fn push_integers(&mut self, package: NodeId, values: &[u64]) -> Result<(), AmlError> {
        for &value in values {
            let element = self.new_integer(value)?;
            self.adopt_variable(package, element)?;
        }
        Ok(())
    }

    fn push_register(&mut self, package: NodeId, register: &GenericAddress) -> Result<(), AmlError> {
        let element = self.new_register_template(register)?;
        self.adopt_variable(package, element)
    }

    // ─── _PRT ───────────────────────────────────────────────────────────────

    /// Appends `Package () { address, pin, source, source_index }` to a
    /// `Name (_PRT, Package () {...})`. Without a `source` link device the
    /// entry names a hard-wired interrupt and `source_index` is its GSI.
    ///
    /// # Errors
    ///
    /// - [`AmlError::OutOfRange`] for a pin above 3.
    /// - [`AmlError::InvalidNameString`] for a malformed `source`.
    /// - [`AmlError::TypeMismatch`] if `prt` is not a `Name` holding a
    ///   package.
    pub fn add_prt_entry(
        &mut self,
        prt: NodeId,
        address: u32,
        pin: u8,
        source: Option<&str>,
        source_index: u32,
    ) -> Result<NodeId, AmlError> {
        if pin > 3 {
            return Err(AmlError::OutOfRange);
        }
        let source = source.map(NameString::from_asl).transpose()?;
        let table = self.named_package(prt)?;
        self.build_package(table, |tree, entry| {
            tree.push_integers(entry, &[u64::from(address), u64::from(pin)])?;
            let link = match &source {
                Some(name) => tree.new_name_reference(name)?,
                None => tree.new_integer(0)?,
            };
            tree.adopt_variable(entry, link)?;
            tree.push_integers(entry, &[u64::from(source_index)])
        })
    }

    // ─── _DSD ───────────────────────────────────────────────────────────────

    /// Appends `ToUUID (uuid), Package () {}` to a `Name (_DSD, Package ()
    /// {...})` and returns the new property package.
    ///
    /// # Errors
    ///
    /// Returns [`AmlError::TypeMismatch`] if `dsd` is not a `Name` holding a
    /// package.
    pub fn add_device_data_descriptor_package(&mut self, dsd: NodeId, uuid: &efi::Guid) -> Result<NodeId, AmlError> {
        let table = self.named_package(dsd)?;
        let buffer = self.new_raw_buffer(uuid.as_bytes())?;
        self.adopt_variable(table, buffer)?;
        let properties = self
            .new_package()
            .and_then(|properties| self.adopt_variable(table, properties).map(|()| properties));
        if properties.is_err() {
            self.detach_node(buffer)?;
            self.delete_tree(buffer)?;
        }
        properties
    }

    /// Appends `Package () { "name", value }` to a `_DSD` property package.
    ///
    /// # Errors
    ///
    /// - [`AmlError::OutOfRange`] if `name` is not ASCII or holds a NUL.
    /// - [`AmlError::TypeMismatch`] if `package` is not a package.
    pub fn add_name_integer_package(&mut self, name: &str, value: u64, package: NodeId) -> Result<NodeId, AmlError> {
        check_text(name)?;
        let package = self.package_node(package)?;
        self.build_package(package, |tree, pair| {
            let key = tree.new_string(name)?;
            tree.adopt_variable(pair, key)?;
            tree.push_integers(pair, &[value])
        })
    }

    /// Appends `Package () { "name", "value" }` to a `_DSD` property package.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::add_name_integer_package`].
    pub fn add_name_string_package(&mut self, name: &str, value: &str, package: NodeId) -> Result<NodeId, AmlError> {
        check_text(name)?;
        check_text(value)?;
        let package = self.package_node(package)?;
        self.build_package(package, |tree, pair| {
            let key = tree.new_string(name)?;
            tree.adopt_variable(pair, key)?;
            let value = tree.new_string(value)?;
            tree.adopt_variable(pair, value)
        })
    }

    // ─── Processor power and performance ────────────────────────────────────

    /// `Name (_CPC, Package () {...})`, revision 3.
    ///
    /// # Errors
    ///
    /// - [`AmlError::OutOfRange`] if a mandatory entry is null or a register
    ///   has an access size above 4.
    /// - Attach errors from [`AmlTree::attach_node`].
    pub fn create_cpc_node(&mut self, info: &CpcInfo, parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        if info.mandatory().iter().any(|entry| entry.is_null()) {
            return Err(AmlError::OutOfRange);
        }
        for entry in info.entries() {
            if let CpcEntry::Register(register) = entry {
                check_register(register)?;
            }
        }
        self.named_package_with("_CPC", parent, |tree, package| {
            tree.push_integers(package, &[CPC_NUM_ENTRIES, CPC_REVISION])?;
            for entry in info.entries() {
                match entry {
                    CpcEntry::Integer(value) => tree.push_integers(package, &[*value])?,
                    CpcEntry::Register(register) => tree.push_register(package, register)?,
                }
            }
            Ok(())
        })
    }

    /// `Name (_PSD, Package () { Package () { 5, 0, domain, coord_type,
    /// num_processors } })`.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] for an unknown coordination type or no
    /// processors.
    pub fn create_psd_node(
        &mut self,
        domain: u32,
        coord_type: u32,
        num_processors: u32,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        check_coordination(coord_type, num_processors)?;
        self.named_package_with("_PSD", parent, |tree, package| {
            tree.build_package(package, |tree, dependency| {
                tree.push_integers(
                    dependency,
                    &[
                        PSD_NUM_ENTRIES,
                        DEPENDENCY_REVISION,
                        u64::from(domain),
                        u64::from(coord_type),
                        u64::from(num_processors),
                    ],
                )
            })
            .map(|_| ())
        })
    }

    /// `Name (_CSD, Package () {...})` with one dependency package per entry.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] for an empty list, an unknown coordination
    /// type or a domain without processors.
    pub fn create_csd_node(&mut self, entries: &[CsdEntry], parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        if entries.is_empty() {
            return Err(AmlError::OutOfRange);
        }
        for entry in entries {
            check_coordination(entry.coord_type, entry.num_processors)?;
        }
        self.named_package_with("_CSD", parent, |tree, package| {
            for entry in entries {
                tree.build_package(package, |tree, dependency| {
                    tree.push_integers(
                        dependency,
                        &[
                            CSD_NUM_ENTRIES,
                            DEPENDENCY_REVISION,
                            u64::from(entry.domain),
                            u64::from(entry.coord_type),
                            u64::from(entry.num_processors),
                            u64::from(entry.index),
                        ],
                    )
                })?;
            }
            Ok(())
        })
    }

    /// `Name (_PCT, Package () { ResourceTemplate () { Register (control) },
    /// ResourceTemplate () { Register (status) } })`.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] for an access size above 4.
    pub fn create_pct_node(
        &mut self,
        control: &GenericAddress,
        status: &GenericAddress,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        check_register(control)?;
        check_register(status)?;
        self.named_package_with("_PCT", parent, |tree, package| {
            tree.push_register(package, control)?;
            tree.push_register(package, status)
        })
    }

    /// `Name (_PSS, Package () {...})` with one six-integer package per
    /// state.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] for an empty list.
    pub fn create_pss_node(&mut self, states: &[PssState], parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        if states.is_empty() {
            return Err(AmlError::OutOfRange);
        }
        self.named_package_with("_PSS", parent, |tree, package| {
            for state in states {
                tree.build_package(package, |tree, entry| {
                    tree.push_integers(
                        entry,
                        &[
                            u64::from(state.core_frequency),
                            u64::from(state.power),
                            u64::from(state.latency),
                            u64::from(state.bus_master_latency),
                            u64::from(state.control),
                            u64::from(state.status),
                        ],
                    )
                })?;
            }
            Ok(())
        })
    }

    /// `Name (_CST, Package () { count, Package () { Register, type, latency,
    /// power }, ... })`.
    ///
    /// # Errors
    ///
    /// [`AmlError::OutOfRange`] for an empty list, a state type outside 1 to
    /// 3 or an access size above 4.
    pub fn create_cst_node(&mut self, states: &[CstState], parent: Option<NodeId>) -> Result<NodeId, AmlError> {
        if states.is_empty() {
            return Err(AmlError::OutOfRange);
        }
        for state in states {
            if !(1..=3).contains(&state.state_type) {
                return Err(AmlError::OutOfRange);
            }
            check_register(&state.register)?;
        }
        self.named_package_with("_CST", parent, |tree, package| {
            tree.push_integers(package, &[states.len() as u64])?;
            for state in states {
                tree.build_package(package, |tree, entry| {
                    tree.push_register(entry, &state.register)?;
                    tree.push_integers(
                        entry,
                        &[u64::from(state.state_type), u64::from(state.latency), u64::from(state.power)],
                    )
                })?;
            }
            Ok(())
        })
    }

    /// `Name (name, Package () { revision, level_id, 0 })`: an `_LPI` table
    /// without states.
    ///
    /// # Errors
    ///
    /// As [`AmlTree::scope`].
    pub fn create_lpi_node(
        &mut self,
        name: &str,
        revision: u16,
        level_id: u64,
        parent: Option<NodeId>,
    ) -> Result<NodeId, AmlError> {
        self.named_package_with(name, parent, |tree, package| {
            tree.push_integers(package, &[u64::from(revision), level_id, 0])
        })
    }

    /// Appends a state to an `_LPI` table built by
    /// [`AmlTree::create_lpi_node`] and bumps its state count.
    ///
    /// # Errors
    ///
    /// - [`AmlError::OutOfRange`] for a malformed name, an access size
    ///   above 4 or a state count that cannot grow.
    /// - [`AmlError::TypeMismatch`] if `lpi` is not an `_LPI` table.
    pub fn add_lpi_state(&mut self, lpi: NodeId, state: &LpiState<'_>) -> Result<NodeId, AmlError> {
        check_text(state.name)?;
        if let LpiEntryMethod::Register(register) = &state.entry_method {
            check_register(register)?;
        }
        check_register(&state.residency_counter)?;
        check_register(&state.usage_counter)?;

        let table = self.named_package(lpi)?;
        let count_node = *self
            .variable_args(table)?
            .get(LPI_COUNT_INDEX)
            .ok_or(AmlError::TypeMismatch)?;
        let count = self.integer_value(count_node)?.checked_add(1).ok_or(AmlError::OutOfRange)?;

        let entry = self.build_package(table, |tree, entry| {
            tree.push_integers(
                entry,
                &[
                    u64::from(state.min_residency),
                    u64::from(state.worst_wakeup_latency),
                    u64::from(state.flags),
                    u64::from(state.arch_flags),
                    u64::from(state.residency_counter_frequency),
                    u64::from(state.enable_parent_state),
                ],
            )?;
            match &state.entry_method {
                LpiEntryMethod::Register(register) => tree.push_register(entry, register)?,
                LpiEntryMethod::Integer(value) => tree.push_integers(entry, &[*value])?,
            }
            tree.push_register(entry, &state.residency_counter)?;
            tree.push_register(entry, &state.usage_counter)?;
            let name = tree.new_string(state.name)?;
            tree.adopt_variable(entry, name)
        })?;

        if let Err(err) = self.set_integer_value(count_node, count) {
            self.detach_node(entry)?;
            self.delete_tree(entry)?;
            return Err(err);
        }
        Ok(entry)
    }
}

//! DIMSE command sets: construction, parsing and status codes.
//!
//! Command sets are data sets of group `0000` elements,
//! always encoded in Implicit VR Little Endian
//! regardless of the negotiated transfer syntax (PS3.7 section 6.3.1).
use medicom_core::dictionary::tags;
use medicom_core::header::VR;
use medicom_object::DataSet;

use crate::error::{Error, Result};

/// Value of _Command Data Set Type_ indicating that
/// no data set follows the command set.
pub const NO_DATA_SET: u16 = 0x0101;

/// Value of _Command Data Set Type_ indicating that
/// a data set follows the command set.
pub const HAS_DATA_SET: u16 = 0x0102;

/// The DIMSE command field values used by this implementation
/// (PS3.7 E.1).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CommandField {
    /// C-STORE-RQ
    CStoreRq,
    /// C-STORE-RSP
    CStoreRsp,
    /// C-GET-RQ
    CGetRq,
    /// C-GET-RSP
    CGetRsp,
    /// C-FIND-RQ
    CFindRq,
    /// C-FIND-RSP
    CFindRsp,
    /// C-MOVE-RQ
    CMoveRq,
    /// C-MOVE-RSP
    CMoveRsp,
    /// C-ECHO-RQ
    CEchoRq,
    /// C-ECHO-RSP
    CEchoRsp,
    /// N-EVENT-REPORT-RQ
    NEventReportRq,
    /// N-EVENT-REPORT-RSP
    NEventReportRsp,
    /// N-ACTION-RQ
    NActionRq,
    /// N-ACTION-RSP
    NActionRsp,
    /// C-CANCEL-RQ
    CCancelRq,
}

impl CommandField {
    /// The wire value of this command field.
    pub fn to_u16(self) -> u16 {
        use CommandField::*;
        match self {
            CStoreRq => 0x0001,
            CStoreRsp => 0x8001,
            CGetRq => 0x0010,
            CGetRsp => 0x8010,
            CFindRq => 0x0020,
            CFindRsp => 0x8020,
            CMoveRq => 0x0021,
            CMoveRsp => 0x8021,
            CEchoRq => 0x0030,
            CEchoRsp => 0x8030,
            NEventReportRq => 0x0100,
            NEventReportRsp => 0x8100,
            NActionRq => 0x0130,
            NActionRsp => 0x8130,
            CCancelRq => 0x0FFF,
        }
    }

    /// Interpret a wire value as a command field.
    pub fn from_u16(value: u16) -> Option<Self> {
        use CommandField::*;
        match value {
            0x0001 => Some(CStoreRq),
            0x8001 => Some(CStoreRsp),
            0x0010 => Some(CGetRq),
            0x8010 => Some(CGetRsp),
            0x0020 => Some(CFindRq),
            0x8020 => Some(CFindRsp),
            0x0021 => Some(CMoveRq),
            0x8021 => Some(CMoveRsp),
            0x0030 => Some(CEchoRq),
            0x8030 => Some(CEchoRsp),
            0x0100 => Some(NEventReportRq),
            0x8100 => Some(NEventReportRsp),
            0x0130 => Some(NActionRq),
            0x8130 => Some(NActionRsp),
            0x0FFF => Some(CCancelRq),
            _ => None,
        }
    }
}

/// The priority of a composite service request.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Priority {
    /// low priority (2)
    Low,
    /// medium priority (0)
    #[default]
    Medium,
    /// high priority (1)
    High,
}

impl Priority {
    /// The wire value of this priority.
    pub fn to_u16(self) -> u16 {
        match self {
            Priority::Medium => 0,
            Priority::High => 1,
            Priority::Low => 2,
        }
    }
}

/// A 16-bit DIMSE status code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Status(pub u16);

/// The category of a DIMSE status code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// the operation concluded successfully
    Success,
    /// partial results follow
    Pending,
    /// the operation concluded with a warning
    Warning,
    /// the operation failed
    Failure,
    /// the operation was cancelled
    Cancel,
}

impl Status {
    /// The success status.
    pub const SUCCESS: Status = Status(0x0000);
    /// The basic pending status.
    pub const PENDING: Status = Status(0xFF00);

    /// The category of this status code (PS3.7 annex C).
    pub fn class(self) -> StatusClass {
        match self.0 {
            0x0000 => StatusClass::Success,
            0xFF00 | 0xFF01 => StatusClass::Pending,
            0xFE00 => StatusClass::Cancel,
            0xB000..=0xB0FF => StatusClass::Warning,
            0x0001 | 0x0107 | 0x0116 => StatusClass::Warning,
            _ => StatusClass::Failure,
        }
    }

    /// Whether this is a success status.
    pub fn is_success(self) -> bool {
        self.class() == StatusClass::Success
    }

    /// Whether this is a pending status.
    pub fn is_pending(self) -> bool {
        self.class() == StatusClass::Pending
    }
}

/// A parsed view over a received command set.
#[derive(Debug, Clone)]
pub struct CommandView {
    /// the command field
    pub field: CommandField,
    /// _Message ID_, on requests
    pub message_id: Option<u16>,
    /// _Message ID Being Responded To_, on responses
    pub responded_to: Option<u16>,
    /// the affected or requested SOP class UID
    pub sop_class_uid: Option<String>,
    /// the affected or requested SOP instance UID
    pub sop_instance_uid: Option<String>,
    /// the status code, on responses
    pub status: Option<Status>,
    /// whether a data set follows the command
    pub has_data_set: bool,
    /// sub-operation counters (remaining, completed, failed, warning)
    pub sub_operations: Option<SubOperationCounts>,
    /// the full command set, for service-specific elements
    pub command: DataSet,
}

/// The sub-operation progress counters of C-MOVE and C-GET responses.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SubOperationCounts {
    /// sub-operations still to be performed
    pub remaining: u16,
    /// sub-operations completed successfully
    pub completed: u16,
    /// sub-operations that failed
    pub failed: u16,
    /// sub-operations that completed with warnings
    pub warning: u16,
}

impl CommandView {
    /// Interpret a decoded command set.
    pub fn from_data_set(command: DataSet) -> Result<Self> {
        let field_value = command
            .uint16(tags::COMMAND_FIELD)
            .map_err(|_| Error::MalformedCommand {
                tag: tags::COMMAND_FIELD,
            })?;
        let field = CommandField::from_u16(field_value).ok_or(Error::MalformedCommand {
            tag: tags::COMMAND_FIELD,
        })?;
        let has_data_set = command
            .uint16(tags::COMMAND_DATA_SET_TYPE)
            .map(|v| v != NO_DATA_SET)
            .unwrap_or(false);

        let sub_operations = command
            .uint16(tags::NUMBER_OF_REMAINING_SUBOPERATIONS)
            .ok()
            .map(|remaining| SubOperationCounts {
                remaining,
                completed: command
                    .uint16(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS)
                    .unwrap_or(0),
                failed: command
                    .uint16(tags::NUMBER_OF_FAILED_SUBOPERATIONS)
                    .unwrap_or(0),
                warning: command
                    .uint16(tags::NUMBER_OF_WARNING_SUBOPERATIONS)
                    .unwrap_or(0),
            })
            .or_else(|| {
                command
                    .uint16(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS)
                    .ok()
                    .map(|completed| SubOperationCounts {
                        remaining: 0,
                        completed,
                        failed: command
                            .uint16(tags::NUMBER_OF_FAILED_SUBOPERATIONS)
                            .unwrap_or(0),
                        warning: command
                            .uint16(tags::NUMBER_OF_WARNING_SUBOPERATIONS)
                            .unwrap_or(0),
                    })
            });

        Ok(CommandView {
            field,
            message_id: command.uint16(tags::MESSAGE_ID).ok(),
            responded_to: command.uint16(tags::MESSAGE_ID_BEING_RESPONDED_TO).ok(),
            sop_class_uid: command
                .uid(tags::AFFECTED_SOP_CLASS_UID)
                .or_else(|_| command.uid(tags::REQUESTED_SOP_CLASS_UID))
                .map(|s| s.to_string())
                .ok(),
            sop_instance_uid: command
                .uid(tags::AFFECTED_SOP_INSTANCE_UID)
                .or_else(|_| command.uid(tags::REQUESTED_SOP_INSTANCE_UID))
                .map(|s| s.to_string())
                .ok(),
            status: command.uint16(tags::STATUS).ok().map(Status),
            has_data_set,
            sub_operations,
            command,
        })
    }

    /// The status of this response,
    /// reported as an error when missing.
    pub fn expect_status(&self) -> Result<Status> {
        self.status.ok_or(Error::MalformedCommand {
            tag: tags::STATUS,
        })
    }
}

fn base_command(field: CommandField, sop_class_uid: &str, data_set_type: u16) -> DataSet {
    let mut command = DataSet::new();
    command.put_value(tags::AFFECTED_SOP_CLASS_UID, VR::UI, sop_class_uid);
    command.put_value(tags::COMMAND_FIELD, VR::US, field.to_u16());
    command.put_value(tags::COMMAND_DATA_SET_TYPE, VR::US, data_set_type);
    command
}

/// Build a C-ECHO-RQ command set.
pub fn echo_rq(message_id: u16, sop_class_uid: &str) -> DataSet {
    let mut command = base_command(CommandField::CEchoRq, sop_class_uid, NO_DATA_SET);
    command.put_value(tags::MESSAGE_ID, VR::US, message_id);
    command
}

/// Build a C-ECHO-RSP command set.
pub fn echo_rsp(responded_to: u16, sop_class_uid: &str, status: Status) -> DataSet {
    let mut command = base_command(CommandField::CEchoRsp, sop_class_uid, NO_DATA_SET);
    command.put_value(tags::MESSAGE_ID_BEING_RESPONDED_TO, VR::US, responded_to);
    command.put_value(tags::STATUS, VR::US, status.0);
    command
}

/// Build a C-STORE-RQ command set.
pub fn store_rq(
    message_id: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    priority: Priority,
) -> DataSet {
    let mut command = base_command(CommandField::CStoreRq, sop_class_uid, HAS_DATA_SET);
    command.put_value(tags::MESSAGE_ID, VR::US, message_id);
    command.put_value(tags::PRIORITY, VR::US, priority.to_u16());
    command.put_value(tags::AFFECTED_SOP_INSTANCE_UID, VR::UI, sop_instance_uid);
    command
}

/// Build a C-STORE-RSP command set.
pub fn store_rsp(
    responded_to: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    status: Status,
) -> DataSet {
    let mut command = base_command(CommandField::CStoreRsp, sop_class_uid, NO_DATA_SET);
    command.put_value(tags::MESSAGE_ID_BEING_RESPONDED_TO, VR::US, responded_to);
    command.put_value(tags::STATUS, VR::US, status.0);
    command.put_value(tags::AFFECTED_SOP_INSTANCE_UID, VR::UI, sop_instance_uid);
    command
}

/// Build a C-FIND-RQ command set.
pub fn find_rq(message_id: u16, sop_class_uid: &str, priority: Priority) -> DataSet {
    let mut command = base_command(CommandField::CFindRq, sop_class_uid, HAS_DATA_SET);
    command.put_value(tags::MESSAGE_ID, VR::US, message_id);
    command.put_value(tags::PRIORITY, VR::US, priority.to_u16());
    command
}

/// Build a C-MOVE-RQ command set naming the destination AE.
pub fn move_rq(
    message_id: u16,
    sop_class_uid: &str,
    priority: Priority,
    destination: &str,
) -> DataSet {
    let mut command = base_command(CommandField::CMoveRq, sop_class_uid, HAS_DATA_SET);
    command.put_value(tags::MESSAGE_ID, VR::US, message_id);
    command.put_value(tags::PRIORITY, VR::US, priority.to_u16());
    command.put_value(tags::MOVE_DESTINATION, VR::AE, destination);
    command
}

/// Build a C-GET-RQ command set.
pub fn get_rq(message_id: u16, sop_class_uid: &str, priority: Priority) -> DataSet {
    let mut command = base_command(CommandField::CGetRq, sop_class_uid, HAS_DATA_SET);
    command.put_value(tags::MESSAGE_ID, VR::US, message_id);
    command.put_value(tags::PRIORITY, VR::US, priority.to_u16());
    command
}

/// Build a C-FIND-RSP command set.
/// Pending responses carry a matching data set.
pub fn find_rsp(responded_to: u16, sop_class_uid: &str, status: Status) -> DataSet {
    let data_set_type = if status.is_pending() {
        HAS_DATA_SET
    } else {
        NO_DATA_SET
    };
    let mut command = base_command(CommandField::CFindRsp, sop_class_uid, data_set_type);
    command.put_value(tags::MESSAGE_ID_BEING_RESPONDED_TO, VR::US, responded_to);
    command.put_value(tags::STATUS, VR::US, status.0);
    command
}

/// Build a C-MOVE-RSP command set with sub-operation counters.
pub fn move_rsp(
    responded_to: u16,
    sop_class_uid: &str,
    status: Status,
    counts: SubOperationCounts,
) -> DataSet {
    let mut command = base_command(CommandField::CMoveRsp, sop_class_uid, NO_DATA_SET);
    command.put_value(tags::MESSAGE_ID_BEING_RESPONDED_TO, VR::US, responded_to);
    command.put_value(tags::STATUS, VR::US, status.0);
    command.put_value(
        tags::NUMBER_OF_REMAINING_SUBOPERATIONS,
        VR::US,
        counts.remaining,
    );
    command.put_value(
        tags::NUMBER_OF_COMPLETED_SUBOPERATIONS,
        VR::US,
        counts.completed,
    );
    command.put_value(tags::NUMBER_OF_FAILED_SUBOPERATIONS, VR::US, counts.failed);
    command.put_value(tags::NUMBER_OF_WARNING_SUBOPERATIONS, VR::US, counts.warning);
    command
}

/// Build an N-ACTION-RSP command set.
pub fn action_rsp(
    responded_to: u16,
    sop_class_uid: &str,
    sop_instance_uid: &str,
    status: Status,
) -> DataSet {
    let mut command = base_command(CommandField::NActionRsp, sop_class_uid, NO_DATA_SET);
    command.put_value(tags::MESSAGE_ID_BEING_RESPONDED_TO, VR::US, responded_to);
    command.put_value(tags::AFFECTED_SOP_INSTANCE_UID, VR::UI, sop_instance_uid);
    command.put_value(tags::STATUS, VR::US, status.0);
    command
}

/// Build an N-ACTION-RQ command set.
pub fn action_rq(
    message_id: u16,
    requested_sop_class_uid: &str,
    requested_sop_instance_uid: &str,
    action_type_id: u16,
) -> DataSet {
    let mut command = DataSet::new();
    command.put_value(
        tags::REQUESTED_SOP_CLASS_UID,
        VR::UI,
        requested_sop_class_uid,
    );
    command.put_value(tags::COMMAND_FIELD, VR::US, CommandField::NActionRq.to_u16());
    command.put_value(tags::MESSAGE_ID, VR::US, message_id);
    command.put_value(tags::COMMAND_DATA_SET_TYPE, VR::US, HAS_DATA_SET);
    command.put_value(
        tags::REQUESTED_SOP_INSTANCE_UID,
        VR::UI,
        requested_sop_instance_uid,
    );
    command.put_value(tags::ACTION_TYPE_ID, VR::US, action_type_id);
    command
}

/// Build an N-EVENT-REPORT-RQ command set.
pub fn event_report_rq(
    message_id: u16,
    affected_sop_class_uid: &str,
    affected_sop_instance_uid: &str,
    event_type_id: u16,
) -> DataSet {
    let mut command = base_command(
        CommandField::NEventReportRq,
        affected_sop_class_uid,
        HAS_DATA_SET,
    );
    command.put_value(tags::MESSAGE_ID, VR::US, message_id);
    command.put_value(
        tags::AFFECTED_SOP_INSTANCE_UID,
        VR::UI,
        affected_sop_instance_uid,
    );
    command.put_value(tags::EVENT_TYPE_ID, VR::US, event_type_id);
    command
}

/// Build an N-EVENT-REPORT-RSP command set.
pub fn event_report_rsp(
    responded_to: u16,
    affected_sop_class_uid: &str,
    affected_sop_instance_uid: &str,
    status: Status,
) -> DataSet {
    let mut command = base_command(
        CommandField::NEventReportRsp,
        affected_sop_class_uid,
        NO_DATA_SET,
    );
    command.put_value(tags::MESSAGE_ID_BEING_RESPONDED_TO, VR::US, responded_to);
    command.put_value(
        tags::AFFECTED_SOP_INSTANCE_UID,
        VR::UI,
        affected_sop_instance_uid,
    );
    command.put_value(tags::STATUS, VR::US, status.0);
    command
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert_eq!(Status(0x0000).class(), StatusClass::Success);
        assert_eq!(Status(0xFF00).class(), StatusClass::Pending);
        assert_eq!(Status(0xFF01).class(), StatusClass::Pending);
        assert_eq!(Status(0xFE00).class(), StatusClass::Cancel);
        assert_eq!(Status(0xB007).class(), StatusClass::Warning);
        assert_eq!(Status(0xA700).class(), StatusClass::Failure);
        assert_eq!(Status(0xA900).class(), StatusClass::Failure);
        assert_eq!(Status(0xC123).class(), StatusClass::Failure);
    }

    #[test]
    fn command_field_values() {
        assert_eq!(CommandField::CEchoRq.to_u16(), 0x0030);
        assert_eq!(CommandField::CEchoRsp.to_u16(), 0x8030);
        assert_eq!(CommandField::from_u16(0x8021), Some(CommandField::CMoveRsp));
        assert_eq!(CommandField::from_u16(0x4242), None);
    }

    #[test]
    fn echo_rq_view_round_trip() {
        let command = echo_rq(7, "1.2.840.10008.1.1");
        let view = CommandView::from_data_set(command).unwrap();
        assert_eq!(view.field, CommandField::CEchoRq);
        assert_eq!(view.message_id, Some(7));
        assert_eq!(view.sop_class_uid.as_deref(), Some("1.2.840.10008.1.1"));
        assert!(!view.has_data_set);
    }

    #[test]
    fn move_rsp_counters_are_exposed() {
        let mut command = base_command(CommandField::CMoveRsp, "1.2", NO_DATA_SET);
        command.put_value(tags::MESSAGE_ID_BEING_RESPONDED_TO, VR::US, 1_u16);
        command.put_value(tags::STATUS, VR::US, 0xFF00_u16);
        command.put_value(tags::NUMBER_OF_REMAINING_SUBOPERATIONS, VR::US, 3_u16);
        command.put_value(tags::NUMBER_OF_COMPLETED_SUBOPERATIONS, VR::US, 2_u16);
        command.put_value(tags::NUMBER_OF_FAILED_SUBOPERATIONS, VR::US, 0_u16);
        command.put_value(tags::NUMBER_OF_WARNING_SUBOPERATIONS, VR::US, 1_u16);

        let view = CommandView::from_data_set(command).unwrap();
        let counts = view.sub_operations.unwrap();
        assert_eq!(counts.remaining, 3);
        assert_eq!(counts.completed, 2);
        assert_eq!(counts.warning, 1);
        assert!(view.expect_status().unwrap().is_pending());
    }
}

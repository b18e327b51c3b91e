use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{Aggregate, AggregateRoot, DomainError, ItemId};
use stockledger_events::Event;

use crate::movement::{Movement, apply_delta};
use crate::reorder::{ReorderPolicy, ReorderSignal};
use crate::spec::{Category, ItemSpec, ItemUpdate, Location, Sku, UnitOfMeasure, UnitPrice};

/// Aggregate root: StockItem.
///
/// Owns `quantity`; the only way to change it is a `MoveStock` command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItem {
    id: ItemId,
    sku: Option<Sku>,
    name: String,
    description: Option<String>,
    category: Category,
    unit: UnitOfMeasure,
    location: Option<Location>,
    unit_price: Option<UnitPrice>,
    reorder: ReorderPolicy,
    quantity: i64,
    active: bool,
    created: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    last_movement_at: Option<DateTime<Utc>>,
    version: u64,
}

impl StockItem {
    /// Create an empty, not-yet-created aggregate instance.
    pub fn empty(id: ItemId) -> Self {
        Self {
            id,
            sku: None,
            name: String::new(),
            description: None,
            category: Category::Component,
            unit: UnitOfMeasure::Piece,
            location: None,
            unit_price: None,
            reorder: ReorderPolicy::default(),
            quantity: 0,
            active: false,
            created: false,
            created_at: None,
            updated_at: None,
            last_movement_at: None,
            version: 0,
        }
    }

    pub fn id_typed(&self) -> ItemId {
        self.id
    }

    /// SKU of a created item. Empty items have none.
    pub fn sku(&self) -> Option<&Sku> {
        self.sku.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn unit(&self) -> UnitOfMeasure {
        self.unit
    }

    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    pub fn unit_price(&self) -> Option<&UnitPrice> {
        self.unit_price.as_ref()
    }

    pub fn reorder(&self) -> ReorderPolicy {
        self.reorder
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn is_active(&self) -> bool {
        self.created && self.active
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn last_movement_at(&self) -> Option<DateTime<Utc>> {
        self.last_movement_at
    }

    pub fn is_at_or_below_reorder_point(&self) -> bool {
        self.reorder.is_at_or_below(self.quantity)
    }

    /// Reorder signal for a transition from `before` to the current quantity.
    pub fn reorder_signal_since(&self, before: i64) -> Option<ReorderSignal> {
        if !self.reorder.crossed_below(before, self.quantity) {
            return None;
        }
        Some(ReorderSignal {
            item_id: self.id,
            sku: self.sku.clone()?,
            current_quantity: self.quantity,
            reorder_point: self.reorder.reorder_point(),
            reorder_quantity: self.reorder.reorder_quantity(),
        })
    }
}

impl AggregateRoot for StockItem {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateItem {
    pub item_id: ItemId,
    pub spec: ItemSpec,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub item_id: ItemId,
    pub update: ItemUpdate,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeactivateItem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateItem {
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MoveStock (one leg of a transaction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStock {
    pub item_id: ItemId,
    pub movement: Movement,
    pub quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemCommand {
    CreateItem(CreateItem),
    UpdateItem(UpdateItem),
    DeactivateItem(DeactivateItem),
    MoveStock(MoveStock),
}

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub item_id: ItemId,
    pub spec: ItemSpec,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemUpdated {
    pub item_id: ItemId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<Location>,
    pub unit_price: Option<UnitPrice>,
    pub reorder: ReorderPolicy,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDeactivated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDeactivated {
    pub item_id: ItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockMoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMoved {
    pub item_id: ItemId,
    pub movement: Movement,
    pub quantity: i64,
    pub delta: i64,
    pub resulting_quantity: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemEvent {
    ItemCreated(ItemCreated),
    ItemUpdated(ItemUpdated),
    ItemDeactivated(ItemDeactivated),
    StockMoved(StockMoved),
}

impl Event for ItemEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ItemEvent::ItemCreated(_) => "inventory.item.created",
            ItemEvent::ItemUpdated(_) => "inventory.item.updated",
            ItemEvent::ItemDeactivated(_) => "inventory.item.deactivated",
            ItemEvent::StockMoved(_) => "inventory.item.stock_moved",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ItemEvent::ItemCreated(e) => e.occurred_at,
            ItemEvent::ItemUpdated(e) => e.occurred_at,
            ItemEvent::ItemDeactivated(e) => e.occurred_at,
            ItemEvent::StockMoved(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockItem {
    type Command = ItemCommand;
    type Event = ItemEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ItemEvent::ItemCreated(e) => {
                self.id = e.item_id;
                self.sku = Some(e.spec.sku().clone());
                self.name = e.spec.name().to_string();
                self.description = e.spec.description().map(str::to_string);
                self.category = e.spec.category();
                self.unit = e.spec.unit();
                self.location = e.spec.location().cloned();
                self.unit_price = e.spec.unit_price().cloned();
                self.reorder = e.spec.reorder();
                self.quantity = 0;
                self.active = true;
                self.created = true;
                self.created_at = Some(e.occurred_at);
            }
            ItemEvent::ItemUpdated(e) => {
                if let Some(name) = &e.name {
                    self.name = name.clone();
                }
                if let Some(description) = &e.description {
                    self.description = Some(description.clone());
                }
                if let Some(location) = &e.location {
                    self.location = Some(location.clone());
                }
                if let Some(price) = &e.unit_price {
                    self.unit_price = Some(price.clone());
                }
                self.reorder = e.reorder;
            }
            ItemEvent::ItemDeactivated(_) => {
                self.active = false;
            }
            ItemEvent::StockMoved(e) => {
                self.quantity += e.delta;
                self.last_movement_at = Some(e.occurred_at);
            }
        }

        self.updated_at = Some(event.occurred_at());
        // +1 per applied event; doubles as the optimistic-lock token.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ItemCommand::CreateItem(cmd) => self.handle_create(cmd),
            ItemCommand::UpdateItem(cmd) => self.handle_update(cmd),
            ItemCommand::DeactivateItem(cmd) => self.handle_deactivate(cmd),
            ItemCommand::MoveStock(cmd) => self.handle_move(cmd),
        }
    }
}

impl StockItem {
    fn ensure_item_id(&self, item_id: ItemId) -> Result<(), DomainError> {
        if self.id != item_id {
            return Err(DomainError::unknown_item(format!(
                "command for {item_id} routed to item {}",
                self.id
            )));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::unknown_item(self.id.to_string()));
        }
        if !self.active {
            return Err(DomainError::unknown_item(format!("{} is inactive", self.id)));
        }
        Ok(())
    }

    /// Per-item timestamps never go backwards, even if the clock does.
    fn movement_time(&self, requested: DateTime<Utc>) -> DateTime<Utc> {
        match self.last_movement_at {
            Some(last) if last > requested => last,
            _ => requested,
        }
    }

    fn handle_create(&self, cmd: &CreateItem) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_item_id(cmd.item_id)?;
        if self.created {
            return Err(DomainError::conflict(format!("item {} already exists", self.id)));
        }
        Ok(vec![ItemEvent::ItemCreated(ItemCreated {
            item_id: cmd.item_id,
            spec: cmd.spec.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateItem) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_item_id(cmd.item_id)?;
        self.ensure_active()?;

        if cmd.update.is_empty() {
            return Ok(vec![]);
        }

        let name = cmd.update.validated_name()?;
        let reorder = cmd.update.resolve_reorder(self.reorder)?;
        let description = cmd
            .update
            .description
            .clone()
            .and_then(crate::spec::normalize_optional);

        Ok(vec![ItemEvent::ItemUpdated(ItemUpdated {
            item_id: cmd.item_id,
            name,
            description,
            location: cmd.update.location.clone(),
            unit_price: cmd.update.unit_price.clone(),
            reorder,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_deactivate(&self, cmd: &DeactivateItem) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_item_id(cmd.item_id)?;
        self.ensure_active()?;
        Ok(vec![ItemEvent::ItemDeactivated(ItemDeactivated {
            item_id: cmd.item_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_move(&self, cmd: &MoveStock) -> Result<Vec<ItemEvent>, DomainError> {
        self.ensure_item_id(cmd.item_id)?;
        self.ensure_active()?;

        if cmd.movement.counterpart() == Some(self.id) {
            return Err(DomainError::invalid_quantity(
                "transfer source and destination must differ",
            ));
        }

        let resulting_quantity = apply_delta(self.quantity, &cmd.movement, cmd.quantity)?;

        Ok(vec![ItemEvent::StockMoved(StockMoved {
            item_id: cmd.item_id,
            movement: cmd.movement,
            quantity: cmd.quantity,
            delta: resulting_quantity - self.quantity,
            resulting_quantity,
            occurred_at: self.movement_time(cmd.occurred_at),
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::movement::AdjustDirection;

    fn spec(sku: &str, reorder_point: i64) -> ItemSpec {
        ItemSpec::new(
            sku,
            "Widget",
            Category::FinishedGood,
            UnitOfMeasure::Piece,
            reorder_point,
            500,
        )
        .unwrap()
    }

    fn created(sku: &str, reorder_point: i64) -> StockItem {
        let id = ItemId::new();
        let mut item = StockItem::empty(id);
        let events = item
            .handle(&ItemCommand::CreateItem(CreateItem {
                item_id: id,
                spec: spec(sku, reorder_point),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        for e in &events {
            item.apply(e);
        }
        item
    }

    fn mv(item: &StockItem, movement: Movement, quantity: i64) -> Result<Vec<ItemEvent>, DomainError> {
        item.handle(&ItemCommand::MoveStock(MoveStock {
            item_id: item.id_typed(),
            movement,
            quantity,
            occurred_at: Utc::now(),
        }))
    }

    fn apply_all(item: &mut StockItem, events: &[ItemEvent]) {
        for e in events {
            item.apply(e);
        }
    }

    #[test]
    fn created_item_starts_empty_and_active() {
        let item = created("ITEM001", 100);
        assert_eq!(item.quantity(), 0);
        assert!(item.is_active());
        assert_eq!(item.version(), 1);
        assert_eq!(item.sku().map(Sku::as_str), Some("ITEM001"));
    }

    #[test]
    fn creating_twice_is_a_conflict() {
        let item = created("ITEM001", 100);
        let err = item
            .handle(&ItemCommand::CreateItem(CreateItem {
                item_id: item.id_typed(),
                spec: spec("ITEM001", 100),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::ConcurrencyConflict(_)));
    }

    #[test]
    fn moves_against_uncreated_item_are_unknown() {
        let item = StockItem::empty(ItemId::new());
        let err = mv(&item, Movement::Receive, 5).unwrap_err();
        assert!(matches!(err, DomainError::UnknownItem(_)));
    }

    #[test]
    fn receive_then_issue_tracks_signed_sum() {
        let mut item = created("ITEM001", 100);

        let events = mv(&item, Movement::Receive, 150).unwrap();
        apply_all(&mut item, &events);
        assert_eq!(item.quantity(), 150);

        let events = mv(&item, Movement::Issue, 60).unwrap();
        apply_all(&mut item, &events);
        assert_eq!(item.quantity(), 90);

        let err = mv(&item, Movement::Issue, 200).unwrap_err();
        assert_eq!(err, DomainError::insufficient_stock(90, 200));
        assert_eq!(item.quantity(), 90);
    }

    #[test]
    fn reorder_signal_fires_once_per_crossing() {
        let mut item = created("ITEM001", 100);
        let events = mv(&item, Movement::Receive, 120).unwrap();
        apply_all(&mut item, &events);

        let before = item.quantity();
        let events = mv(&item, Movement::Issue, 30).unwrap();
        apply_all(&mut item, &events);
        let signal = item.reorder_signal_since(before).expect("crossed below 100");
        assert_eq!(signal.current_quantity, 90);
        assert_eq!(signal.reorder_quantity, 500);

        let before = item.quantity();
        let events = mv(&item, Movement::Issue, 5).unwrap();
        apply_all(&mut item, &events);
        assert_eq!(item.quantity(), 85);
        assert!(item.reorder_signal_since(before).is_none());
    }

    #[test]
    fn deactivated_item_rejects_moves() {
        let mut item = created("ITEM001", 0);
        let events = item
            .handle(&ItemCommand::DeactivateItem(DeactivateItem {
                item_id: item.id_typed(),
                occurred_at: Utc::now(),
            }))
            .unwrap();
        apply_all(&mut item, &events);

        assert!(!item.is_active());
        let err = mv(
            &item,
            Movement::Adjust {
                direction: AdjustDirection::Increase,
            },
            1,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::UnknownItem(_)));
    }

    #[test]
    fn transfer_to_self_is_rejected() {
        let item = created("ITEM001", 0);
        let err = mv(
            &item,
            Movement::TransferOut {
                destination: item.id_typed(),
            },
            1,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::InvalidQuantity(_)));
    }

    #[test]
    fn movement_time_never_goes_backwards() {
        let mut item = created("ITEM001", 0);
        let later = Utc::now() + Duration::hours(1);
        let events = item
            .handle(&ItemCommand::MoveStock(MoveStock {
                item_id: item.id_typed(),
                movement: Movement::Receive,
                quantity: 1,
                occurred_at: later,
            }))
            .unwrap();
        apply_all(&mut item, &events);

        let events = mv(&item, Movement::Receive, 1).unwrap();
        match &events[0] {
            ItemEvent::StockMoved(e) => assert_eq!(e.occurred_at, later),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn update_changes_settings_but_not_quantity() {
        let mut item = created("ITEM001", 10);
        let events = mv(&item, Movement::Receive, 40).unwrap();
        apply_all(&mut item, &events);

        let events = item
            .handle(&ItemCommand::UpdateItem(UpdateItem {
                item_id: item.id_typed(),
                update: ItemUpdate {
                    name: Some("Renamed".to_string()),
                    reorder_point: Some(50),
                    ..ItemUpdate::default()
                },
                occurred_at: Utc::now(),
            }))
            .unwrap();
        apply_all(&mut item, &events);

        assert_eq!(item.name(), "Renamed");
        assert_eq!(item.reorder().reorder_point(), 50);
        assert_eq!(item.quantity(), 40);
        assert!(item.is_at_or_below_reorder_point());
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let item = created("ITEM001", 0);
        let before = item.clone();
        let _ = mv(&item, Movement::Receive, 10).unwrap();
        assert_eq!(item, before);
    }
}

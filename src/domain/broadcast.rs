use super::account::AccountId;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct BoardState {
    messages: Vec<String>,
    /// How many messages each reader has already been shown.
    seen: HashMap<AccountId, usize>,
}

/// Operator announcements for the lifetime of the process.
///
/// Messages are kept in append order. Each reader is shown every message once,
/// on the first interaction after it was published.
#[derive(Default)]
pub struct BroadcastBoard {
    state: RwLock<BoardState>,
}

impl BroadcastBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message and returns how many are now on the board.
    pub async fn publish(&self, message: impl Into<String>) -> usize {
        let mut state = self.state.write().await;
        state.messages.push(message.into());
        state.messages.len()
    }

    /// Appends a message on behalf of `author`.
    ///
    /// The author is not shown their own message, unless earlier messages are
    /// still waiting for them; then it is delivered along with those.
    pub async fn publish_from(&self, author: &AccountId, message: impl Into<String>) -> usize {
        let mut state = self.state.write().await;
        let before = state.messages.len();
        state.messages.push(message.into());
        let total = state.messages.len();

        let seen = state.seen.get(author).copied().unwrap_or(0);
        if seen >= before {
            state.seen.insert(author.clone(), total);
        }
        total
    }

    /// Returns the messages `reader` has not been shown yet and marks them seen.
    pub async fn take_unseen(&self, reader: &AccountId) -> Vec<String> {
        {
            let state = self.state.read().await;
            let seen = state.seen.get(reader).copied().unwrap_or(0);
            if seen >= state.messages.len() {
                return Vec::new();
            }
        }

        let mut state = self.state.write().await;
        let total = state.messages.len();
        let seen = state.seen.insert(reader.clone(), total).unwrap_or(0);
        state.messages[seen.min(total)..].to_vec()
    }

    pub async fn messages(&self) -> Vec<String> {
        self.state.read().await.messages.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_each_reader_sees_messages_once() {
        let board = BroadcastBoard::new();
        let alice = AccountId::from("alice");
        let bob = AccountId::from("bob");

        assert!(board.take_unseen(&alice).await.is_empty());

        board.publish("maintenance at noon").await;
        board.publish("double coins today").await;

        assert_eq!(
            board.take_unseen(&alice).await,
            vec!["maintenance at noon", "double coins today"]
        );
        assert!(board.take_unseen(&alice).await.is_empty());

        board.publish("back online").await;
        assert_eq!(board.take_unseen(&alice).await, vec!["back online"]);
        assert_eq!(board.take_unseen(&bob).await.len(), 3);
    }

    #[tokio::test]
    async fn test_author_skips_only_their_own_message() {
        let board = BroadcastBoard::new();
        let one = AccountId::from("1");
        let two = AccountId::from("2");

        board.publish_from(&one, "from one").await;
        assert!(board.take_unseen(&one).await.is_empty());

        // Two has not read one's message yet, so it stays pending.
        board.publish_from(&two, "from two").await;
        assert_eq!(board.take_unseen(&two).await, vec!["from one", "from two"]);
        assert_eq!(board.take_unseen(&one).await, vec!["from two"]);

        board.publish_from(&two, "again").await;
        assert!(board.take_unseen(&two).await.is_empty());
    }

    #[tokio::test]
    async fn test_publish_keeps_fifo_order() {
        let board = BroadcastBoard::new();
        for i in 0..5 {
            assert_eq!(board.publish(format!("m{i}")).await, i + 1);
        }
        assert_eq!(board.messages().await, vec!["m0", "m1", "m2", "m3", "m4"]);
    }
}

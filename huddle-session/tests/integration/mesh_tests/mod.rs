mod test_presence_reconcile;
